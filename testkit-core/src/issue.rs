// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The issue model.

use crate::{errors::CapturedError, trait_model::SourceLocation};
use std::{error::Error as StdError, fmt, sync::Arc, time::Duration};

/// How bad an issue is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// A named, debug-printed value attached to a test during execution.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub name: String,
    pub payload: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, payload: impl fmt::Debug) -> Self {
        Self {
            name: name.into(),
            payload: format!("{payload:?}"),
        }
    }

    /// Posts this attachment to the ambient event bus as its own
    /// `value_attached` event.
    pub fn attach(self) {
        let ctx = crate::context::ExecContext::current();
        let mut event = crate::event::Event::new(
            crate::event::EventKind::ValueAttached(self),
            ctx.elapsed(),
        )
        .with_test(ctx.test_id.clone());
        if let Some(case_id) = ctx.test_case_id.clone() {
            event = event.with_test_case(case_id);
        }
        ctx.bus.post(event);
    }
}

/// A breakdown of an elapsed duration into whole components, used by
/// `time_limit_exceeded` issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElapsedComponents {
    pub minutes: u64,
    pub seconds: u64,
    pub milliseconds: u32,
}

impl From<Duration> for ElapsedComponents {
    fn from(d: Duration) -> Self {
        let total_secs = d.as_secs();
        Self {
            minutes: total_secs / 60,
            seconds: total_secs % 60,
            milliseconds: d.subsec_millis(),
        }
    }
}

/// The kind of issue recorded.
#[derive(Clone, Debug)]
pub enum IssueKind {
    /// Posted by the (external) expectation-capture machinery when a
    /// `#expect` fails.
    ExpectationFailed,
    /// Posted when a `#confirm`-style soft check fails.
    ConfirmationFailed,
    /// Any other error thrown from a test body.
    ErrorCaught(Arc<dyn StdError + Send + Sync>),
    /// The time limit budget was exceeded.
    TimeLimitExceeded { components: ElapsedComponents },
    /// An internal system failure, unrelated to the test's own assertions.
    System,
    /// The test-authoring API was misused.
    ApiMisused,
    /// A `with_known_issue` scope completed without recording anything,
    /// even though a known issue was expected.
    KnownIssueNotRecorded,
    /// An unconditional failure, e.g. `Issue::record_unconditional(...)`.
    Unconditional,
    /// A named value was attached to the test.
    ValueAttached(Attachment),
}

impl IssueKind {
    fn default_severity(&self) -> Severity {
        match self {
            IssueKind::ValueAttached(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A record produced when something fails or a noteworthy condition arises
/// during a test's execution.
#[derive(Clone, Debug)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub comments: Vec<String>,
    pub source_location: Option<SourceLocation>,
    pub backtrace: Option<Arc<str>>,
    pub is_known: bool,
}

impl Issue {
    pub fn new(kind: IssueKind) -> Self {
        let severity = kind.default_severity();
        Self {
            kind,
            severity,
            comments: Vec::new(),
            source_location: None,
            backtrace: None,
            is_known: false,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    pub fn with_source_location(mut self, location: SourceLocation) -> Self {
        self.source_location = Some(location);
        self
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<Arc<str>>) -> Self {
        self.backtrace = Some(backtrace.into());
        self
    }

    pub fn known(mut self) -> Self {
        self.is_known = true;
        self
    }

    /// Whether this issue counts toward a test being considered failed:
    /// an unknown error-severity issue.
    pub fn is_failure(&self) -> bool {
        self.severity == Severity::Error && !self.is_known
    }

    /// Builds the `error_caught` issue for an arbitrary captured error,
    /// applying its [`CustomizeIssue`](crate::errors::CustomizeIssue) hook if
    /// it was captured with one.
    pub fn from_caught_error(err: &CapturedError) -> Self {
        let base = Issue::new(IssueKind::ErrorCaught(Arc::from(
            format_error_owned(err.error()),
        )));
        err.customize_issue(base)
    }

    /// Convenience constructor for an unconditional failure.
    pub fn unconditional(comment: impl Into<String>) -> Self {
        Issue::new(IssueKind::Unconditional).with_comment(comment)
    }

    /// Posts this issue to the ambient event bus.
    pub fn record(self) {
        let ctx = crate::context::ExecContext::current();
        let mut event = crate::event::Event::new(
            crate::event::EventKind::IssueRecorded(self),
            ctx.elapsed(),
        )
        .with_test(ctx.test_id.clone());
        if let Some(case_id) = ctx.test_case_id.clone() {
            event = event.with_test_case(case_id);
        }
        ctx.bus.post(event);
    }

    /// Records the `error_caught` issue for `err`, applying its customize
    /// hook if it has one.
    pub fn record_error(err: CapturedError) {
        Self::from_caught_error(&err).record()
    }
}

/// Wraps a `&DynError` in an owned, `Send + Sync` error so it can live in an
/// [`Issue`] independent of the original error's lifetime.
fn format_error_owned(err: &crate::errors::DynError) -> FormattedError {
    FormattedError(err.to_string())
}

#[derive(Debug)]
struct FormattedError(String);

impl fmt::Display for FormattedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for FormattedError {}
