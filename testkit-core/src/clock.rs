// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The abstract clock.
//!
//! The core never reads wall-clock time for ordering tests, only for
//! reporting elapsed durations and enforcing time limits. The
//! concrete clock source is supplied by the host; [`SystemClock`] is the default, tokio-backed
//! implementation.

use std::{fmt, future::Future, pin::Pin};
use tokio::time::Instant;

/// An abstract monotonic instant in time.
pub type ClockInstant = Instant;

/// The clock collaborator the core consumes.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> ClockInstant;
    fn sleep_until(&self, deadline: ClockInstant) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// The default clock, backed by tokio's timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> ClockInstant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: ClockInstant) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep_until(deadline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn sleep_until_resolves_at_deadline() {
        let clock = SystemClock;
        let start = clock.now();
        let deadline = start + Duration::from_millis(50);
        clock.sleep_until(deadline).await;
        assert!(clock.now() >= deadline);
    }
}
