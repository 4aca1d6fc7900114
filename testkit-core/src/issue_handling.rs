// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The issue-handling chain.
//!
//! `IssueHandlingTrait` wraps a closure `Issue -> Option<Issue>`. While its
//! scope is active it installs an event-bus frame that intercepts
//! `issue_recorded` events: the closure runs, and the result is either
//! forwarded (rewritten) to the outer handler or dropped. Every other event
//! kind passes through unchanged. Composition is handled entirely by
//! [`crate::event::EventBus`]'s frame nesting: each
//! [`IssueHandlingTrait::scope_provider`] call pushes one more frame, so for
//! a given issue, frames run innermost-to-outermost and any frame returning
//! `None` stops the chain.

use crate::{
    context::ExecContext,
    descriptor::{TestCase, TestDescriptor},
    errors::CapturedError,
    event::{Event, EventKind},
    issue::Issue,
    trait_model::{BoxFuture, ScopeContext, ScopeProvider, SuiteTrait, TestTrait, Trait},
};
use std::{fmt, sync::Arc};

/// `Issue -> Option<Issue>`: transform, suppress, or pass an issue through
/// unchanged.
pub type TransformFn = Arc<dyn Fn(Issue) -> Option<Issue> + Send + Sync>;

#[derive(Clone)]
pub struct IssueHandlingTrait {
    transform: TransformFn,
}

impl fmt::Debug for IssueHandlingTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueHandlingTrait").finish_non_exhaustive()
    }
}

impl IssueHandlingTrait {
    pub fn new(transform: TransformFn) -> Self {
        Self { transform }
    }

    /// A handling trait that suppresses every issue at or above `severity`.
    pub fn suppressing_at_least(severity: crate::issue::Severity) -> Self {
        Self::new(Arc::new(move |issue: Issue| {
            if issue.severity as u8 >= severity as u8 {
                None
            } else {
                Some(issue)
            }
        }))
    }
}

struct HandlingScope {
    transform: TransformFn,
}

impl ScopeProvider for HandlingScope {
    fn provide_scope<'a>(
        &'a self,
        _ctx: &'a ScopeContext<'a>,
        body: BoxFuture<'a, Result<(), CapturedError>>,
    ) -> BoxFuture<'a, Result<(), CapturedError>> {
        Box::pin(async move {
            // The transform closure itself runs under the *outer* handler's
            // event configuration: we push the new frame onto the context's
            // bus for `body`, but `transform` below reads `outer` out of the
            // pushed frame, not the frame itself, preventing an issue
            // produced during transform from re-entering this same handler.
            let outer_ctx = ExecContext::current();
            let transform = Arc::clone(&self.transform);
            let new_bus = outer_ctx.bus.push(Arc::new(move |event: Event, outer| {
                let Event {
                    kind,
                    timestamp,
                    elapsed,
                    test_id,
                    test_case_id,
                } = event;
                match kind {
                    EventKind::IssueRecorded(issue) => {
                        if let Some(rewritten) = transform(issue) {
                            outer.post(Event {
                                kind: EventKind::IssueRecorded(rewritten),
                                timestamp,
                                elapsed,
                                test_id,
                                test_case_id,
                            });
                        }
                        // `None` stops the chain: the event is suppressed.
                    }
                    other => outer.post(Event {
                        kind: other,
                        timestamp,
                        elapsed,
                        test_id,
                        test_case_id,
                    }),
                }
            }));
            ExecContext::with_bus(new_bus).scoped(body).await
        })
    }
}

impl Trait for IssueHandlingTrait {
    fn scope_provider(
        &self,
        _test: &TestDescriptor,
        _case: Option<&TestCase>,
    ) -> Option<Arc<dyn ScopeProvider>> {
        Some(Arc::new(HandlingScope {
            transform: Arc::clone(&self.transform),
        }))
    }
}

impl TestTrait for IssueHandlingTrait {}
impl SuiteTrait for IssueHandlingTrait {
    const RECURSIVE: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        descriptor::TestId,
        event::EventBus,
        issue::{IssueKind, Severity},
    };
    use std::sync::{Arc as StdArc, Mutex};

    #[tokio::test]
    async fn suppresses_matching_severity_and_forwards_rest() {
        let received = StdArc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let outer_bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));

        let handling = IssueHandlingTrait::suppressing_at_least(Severity::Error);
        let scope = handling
            .scope_provider(
                &TestDescriptor::suite(
                    TestId::new("s"),
                    "s",
                    crate::trait_model::SourceLocation::new("f", 1, 1),
                    Vec::new(),
                ),
                None,
            )
            .unwrap();

        let ctx = ExecContext {
            bus: outer_bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: StdArc::new(SystemClock),
            cancellation: crate::cancellation::CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        let test = TestDescriptor::suite(
            TestId::new("s"),
            "s",
            crate::trait_model::SourceLocation::new("f", 1, 1),
            Vec::new(),
        );
        let scope_ctx = ScopeContext {
            test: &test,
            case: None,
        };

        let body: BoxFuture<'_, Result<(), CapturedError>> = Box::pin(async {
            ExecContext::current()
                .bus
                .post(Event::new(
                    EventKind::IssueRecorded(Issue::new(IssueKind::System)),
                    std::time::Duration::ZERO,
                ));
            ExecContext::current().bus.post(Event::new(
                EventKind::IssueRecorded(
                    Issue::new(IssueKind::ValueAttached(crate::issue::Attachment::new(
                        "x", 1,
                    )))
                    .with_severity(Severity::Warning),
                ),
                std::time::Duration::ZERO,
            ));
            Ok(())
        });

        ctx.scoped(scope.provide_scope(&scope_ctx, body)).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1, "the error-severity issue was suppressed");
    }
}
