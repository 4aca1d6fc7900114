// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal-driven cancellation.
//!
//! spec.md only asks for "a cancellation source (Ctrl-C or host cancel)" —
//! unlike the teacher, which also tracks job-control (SIGTSTP/SIGCONT) and
//! info-query (SIGINFO/SIGUSR1) signals for its CLI output, this core only
//! needs to know when to start cancelling in-flight work, so those variants
//! are dropped and `SignalEvent` is reduced to the shutdown case.

use crate::errors::SignalHandlerSetupError;

/// The kind of signal handling to set up for a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum SignalHandlerKind {
    /// Cancel on Ctrl-C and the standard termination signals.
    Standard,
    /// Never cancel on signals; used by embedders that manage their own
    /// `CancellationToken`, and by tests.
    Noop,
}

impl Default for SignalHandlerKind {
    fn default() -> Self {
        Self::Standard
    }
}

impl SignalHandlerKind {
    pub(crate) fn build(self) -> Result<SignalHandler, SignalHandlerSetupError> {
        match self {
            Self::Standard => SignalHandler::new(),
            Self::Noop => Ok(SignalHandler::noop()),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SignalHandler {
    signals: Option<imp::Signals>,
}

impl SignalHandler {
    #[cfg(any(unix, windows))]
    pub(crate) fn new() -> Result<Self, SignalHandlerSetupError> {
        let signals = imp::Signals::new().map_err(|source| SignalHandlerSetupError { source })?;
        Ok(Self {
            signals: Some(signals),
        })
    }

    #[cfg(not(any(unix, windows)))]
    pub(crate) fn new() -> Result<Self, SignalHandlerSetupError> {
        Ok(Self::noop())
    }

    pub(crate) fn noop() -> Self {
        Self { signals: None }
    }

    /// Resolves the next time a shutdown-triggering signal arrives; never
    /// resolves for a no-op handler.
    pub(crate) async fn recv(&mut self) -> Option<ShutdownEvent> {
        match &mut self.signals {
            Some(signals) => signals.recv().await,
            None => std::future::pending().await,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ShutdownEvent {
    #[cfg(unix)]
    Hangup,
    #[cfg(unix)]
    Term,
    #[cfg(unix)]
    Quit,
    Interrupt,
}

#[cfg(unix)]
mod imp {
    use super::ShutdownEvent;
    use std::io;
    use tokio::signal::unix::{signal, SignalKind};
    use tokio_stream::{wrappers::SignalStream, StreamExt, StreamMap};

    #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
    enum SignalId {
        Int,
        Hup,
        Term,
        Quit,
    }

    #[derive(Debug)]
    pub(super) struct Signals {
        map: StreamMap<SignalId, SignalStream>,
    }

    impl Signals {
        pub(super) fn new() -> io::Result<Self> {
            let mut map = StreamMap::new();
            map.extend([
                (SignalId::Int, signal_stream(SignalKind::interrupt())?),
                (SignalId::Hup, signal_stream(SignalKind::hangup())?),
                (SignalId::Term, signal_stream(SignalKind::terminate())?),
                (SignalId::Quit, signal_stream(SignalKind::quit())?),
            ]);
            Ok(Self { map })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            self.map.next().await.map(|(id, _)| match id {
                SignalId::Int => ShutdownEvent::Interrupt,
                SignalId::Hup => ShutdownEvent::Hangup,
                SignalId::Term => ShutdownEvent::Term,
                SignalId::Quit => ShutdownEvent::Quit,
            })
        }
    }

    fn signal_stream(kind: SignalKind) -> io::Result<SignalStream> {
        Ok(SignalStream::new(signal(kind)?))
    }
}

#[cfg(windows)]
mod imp {
    use super::ShutdownEvent;
    use tokio::signal::windows::{ctrl_c, CtrlC};

    #[derive(Debug)]
    pub(super) struct Signals {
        ctrl_c: CtrlC,
        done: bool,
    }

    impl Signals {
        pub(super) fn new() -> std::io::Result<Self> {
            Ok(Self {
                ctrl_c: ctrl_c()?,
                done: false,
            })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            if self.done {
                return None;
            }
            match self.ctrl_c.recv().await {
                Some(()) => Some(ShutdownEvent::Interrupt),
                None => {
                    self.done = true;
                    None
                }
            }
        }
    }
}
