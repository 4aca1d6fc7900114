// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error and control-signal types produced by the core runtime.
//!
//! Most of these are not "errors" in the sense of something going wrong with
//! *testkit-core* itself — they're the typed vocabulary the runner uses to
//! classify what a trait, a condition, or a test body did. See
//! [`crate::issue`] for how they eventually turn into issues.

use crate::trait_model::SourceLocation;
use std::{error::Error as StdError, fmt, sync::Arc};

/// A boxed, type-erased error.
///
/// The core is agnostic to what a test body or trait actually throws; it
/// only needs `std::error::Error` plus `Send + Sync` so it can cross task
/// boundaries and be recorded as an issue.
pub type DynError = Box<dyn StdError + Send + Sync + 'static>;

/// A hook that lets a user-defined error rewrite the issue recorded for it
/// at the point of capture.
pub trait CustomizeIssue: StdError + Send + Sync + 'static {
    /// Rewrites the default `error_caught` issue this error would otherwise produce.
    fn customize(&self, issue: crate::issue::Issue) -> crate::issue::Issue;
}

/// The error type returned from test bodies, `prepare` hooks, and scope
/// providers.
///
/// Wraps an arbitrary boxed error, optionally carrying a
/// [`CustomizeIssue`] hook captured at the point the concrete error type was
/// still known. Ordinary errors convert in via `?` through the
/// blanket [`From`] impl; errors that want to customize their issue go
/// through [`CapturedError::with_customize`].
pub struct CapturedError {
    pub(crate) error: DynError,
    #[allow(clippy::type_complexity)]
    customize: Option<Arc<dyn Fn(crate::issue::Issue) -> crate::issue::Issue + Send + Sync>>,
}

impl CapturedError {
    /// Captures an error without a customize hook.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            error: Box::new(error),
            customize: None,
        }
    }

    /// Captures an error, remembering its [`CustomizeIssue`] hook while the
    /// concrete type is still known.
    pub fn with_customize<E>(error: E) -> Self
    where
        E: CustomizeIssue,
    {
        let shared = Arc::new(error);
        let hook = Arc::clone(&shared);
        Self {
            error: Box::new(ArcErrorWrapper(shared)),
            customize: Some(Arc::new(move |issue| hook.customize(issue))),
        }
    }

    pub fn error(&self) -> &DynError {
        &self.error
    }

    pub fn into_inner(self) -> DynError {
        self.error
    }

    /// Applies this error's customize hook (if any) to a freshly built
    /// `error_caught` issue, otherwise returns the issue unchanged.
    pub(crate) fn customize_issue(&self, issue: crate::issue::Issue) -> crate::issue::Issue {
        match &self.customize {
            Some(hook) => hook(issue),
            None => issue,
        }
    }
}

impl<E> From<E> for CapturedError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.error, f)
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl StdError for CapturedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.error.source()
    }
}

/// Adapts a shared, concrete error into a boxed [`std::error::Error`]
/// without requiring the original error to implement `Clone`.
struct ArcErrorWrapper<E>(Arc<E>);

impl<E: StdError> fmt::Debug for ArcErrorWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl<E: StdError> fmt::Display for ArcErrorWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl<E: StdError + 'static> StdError for ArcErrorWrapper<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// A non-error control signal produced by [`crate::condition`] evaluation
/// (and by traits that decide a test is unavailable for some other reason).
///
/// A `Skip` is deliberately not a `DynError`: it never becomes an
/// `issue_recorded` event, and the runner must be able to
/// distinguish it from a genuine failure without downcasting.
#[derive(Clone, Debug)]
pub struct Skip {
    comment: Option<String>,
    source_location: Option<SourceLocation>,
}

impl Skip {
    /// Creates a new skip signal with an optional human-readable reason.
    pub fn new(comment: impl Into<Option<String>>, source_location: Option<SourceLocation>) -> Self {
        Self {
            comment: comment.into(),
            source_location,
        }
    }

    /// The comment attached to the condition that produced this skip, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn source_location(&self) -> Option<&SourceLocation> {
        self.source_location.as_ref()
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comment {
            Some(c) => write!(f, "skipped: {c}"),
            None => write!(f, "skipped"),
        }
    }
}

/// The outcome of running a trait's `prepare` hook.
///
/// `prepare` is allowed to do one of three things: succeed, ask that the test
/// be skipped, or fail outright (which the runner records as a failure and
/// does not run the test body).
#[derive(Debug)]
pub enum PrepareOutcome {
    /// `prepare` completed normally; the next trait (or the test body) may run.
    Continue,
    /// `prepare` determined the test should not run at all.
    Skip(Skip),
    /// `prepare` itself failed; this is recorded as `error_caught` and the
    /// test is marked failed without its body ever running.
    Failed(CapturedError),
}

/// Sentinel error thrown by a `#require`-style hard assertion.
///
/// The expression-capture machinery that implements `#expect`/`#require` is
/// external to this core, but the core must recognize this
/// specific sentinel to avoid double-recording the issue that the
/// expectation machinery already posted before throwing it.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct ExpectationFailed;

impl fmt::Display for ExpectationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a required expectation failed")
    }
}

impl StdError for ExpectationFailed {}

impl ExpectationFailed {
    /// Returns true if `err` is (or wraps) an [`ExpectationFailed`] sentinel.
    pub fn matches(err: &CapturedError) -> bool {
        err.error.downcast_ref::<ExpectationFailed>().is_some()
    }
}

/// Error returned when building a [`crate::runner::PlanRunner`] fails.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunnerBuildError {
    /// The requested signal handler could not be installed.
    #[error("failed to set up signal handler")]
    SignalHandlerSetup(#[source] SignalHandlerSetupError),
}

/// Error returned when installing the process/task signal handler fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to set up signal handler")]
#[non_exhaustive]
pub struct SignalHandlerSetupError {
    #[source]
    pub(crate) source: std::io::Error,
}

/// Error returned for combinations this runtime intentionally leaves
/// unimplemented.
///
/// The precise semantics of `.serialized(.withinGroup(_))` against a
/// condition-gated scope are unspecified — a serializer keyed to a
/// condition that can itself change admission order has no well-defined
/// barrier ordering — so this core rejects the combination rather than
/// guessing at behavior. See DESIGN.md.
#[derive(Debug, thiserror::Error)]
#[error("`.serialized(.withinGroup({group}))` is not implemented by this runtime")]
#[non_exhaustive]
pub struct UnsupportedSerializationError {
    pub group: String,
}

/// Error returned by [`crate::scheduler`] when a barrier is scheduled onto a
/// work group that has already been shut down.
#[derive(Debug, thiserror::Error)]
#[error("work group is shutting down, cannot schedule more work")]
#[non_exhaustive]
pub struct SchedulerShutdownError;

/// Error returned when a time limit is constructed with an invalid
/// granularity or bound.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TimeLimitConfigError {
    /// `test_time_limit_granularity` was configured below the 1-minute floor.
    #[error("time limit granularity must be at least 1 minute")]
    ZeroGranularity,
}
