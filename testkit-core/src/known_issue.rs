// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `with_known_issue`.
//!
//! Unlike [`crate::issue_handling::IssueHandlingTrait`], this isn't a trait
//! attached to a descriptor — it's a scope a test body enters explicitly,
//! the way `#[tokio::test]` bodies call `tokio::time::pause()` inline. It
//! pushes the same kind of event-bus frame, but its transform is fixed:
//! mark every issue recorded within as known, never suppress.

use crate::{
    context::ExecContext,
    event::{Event, EventKind},
    issue::{Issue, IssueKind},
};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Runs `body`, marking every issue it records as `is_known = true`.
///
/// If `body` completes without recording a single issue, that's itself
/// noteworthy — the known issue this scope exists to mask apparently stopped
/// reproducing — so a `known_issue_not_recorded` issue is posted once the
/// scope has exited, via the bus captured *before* this call's own frame was
/// pushed, so this call never marks its own "not recorded" signal known. Any
/// *enclosing* `with_known_issue` scope still marks it known in turn, the
/// same as it would any other issue recorded anywhere inside it — nesting
/// composes here exactly as it does for ordinary issues.
pub async fn with_known_issue<F, T>(comment: Option<String>, body: F) -> T
where
    F: Future<Output = T>,
{
    let outer_ctx = ExecContext::current();
    let recorded_any = Arc::new(AtomicBool::new(false));
    let recorded_any_in_frame = recorded_any.clone();
    let comment = comment.map(Arc::<str>::from);
    let frame_comment = comment.clone();
    let new_bus = outer_ctx.bus.push(Arc::new(move |event: Event, outer| {
        let Event {
            kind,
            timestamp,
            elapsed,
            test_id,
            test_case_id,
        } = event;
        let kind = match kind {
            EventKind::IssueRecorded(issue) => {
                recorded_any_in_frame.store(true, Ordering::Relaxed);
                let issue = mark_known(issue, frame_comment.as_deref());
                EventKind::IssueRecorded(issue)
            }
            other => other,
        };
        outer.post(Event {
            kind,
            timestamp,
            elapsed,
            test_id,
            test_case_id,
        });
    }));

    let output = ExecContext::with_bus(new_bus).scoped(body).await;

    if !recorded_any.load(Ordering::Relaxed) {
        let mut issue = Issue::new(IssueKind::KnownIssueNotRecorded);
        if let Some(comment) = &comment {
            issue = issue.with_comment(comment.as_ref());
        }
        let event = Event::new(EventKind::IssueRecorded(issue), outer_ctx.elapsed())
            .with_test(outer_ctx.test_id.clone());
        let event = match &outer_ctx.test_case_id {
            Some(case_id) => event.with_test_case(case_id.clone()),
            None => event,
        };
        outer_ctx.bus.post(event);
    }

    output
}

fn mark_known(mut issue: Issue, comment: Option<&str>) -> Issue {
    issue.is_known = true;
    if let Some(comment) = comment {
        issue.comments.push(comment.to_string());
    }
    issue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cancellation::CancellationToken,
        clock::SystemClock,
        descriptor::TestId,
        event::EventBus,
        issue::IssueKind,
    };
    use std::sync::{Arc as StdArc, Mutex};

    #[tokio::test]
    async fn marks_issues_recorded_inside_as_known() {
        let received = StdArc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));
        let ctx = ExecContext {
            bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: StdArc::new(SystemClock),
            cancellation: CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        ctx.scoped(async {
            with_known_issue(Some("flaky on CI".into()), async {
                ExecContext::current().bus.post(Event::new(
                    EventKind::IssueRecorded(Issue::new(IssueKind::System)),
                    std::time::Duration::ZERO,
                ));
            })
            .await;
        })
        .await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            EventKind::IssueRecorded(issue) => {
                assert!(issue.is_known);
                assert!(!issue.is_failure());
            }
            _ => panic!("expected issue_recorded"),
        }
    }

    #[tokio::test]
    async fn completing_without_recording_anything_reports_known_issue_not_recorded() {
        let received = StdArc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));
        let ctx = ExecContext {
            bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: StdArc::new(SystemClock),
            cancellation: CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        ctx.scoped(async {
            with_known_issue(Some("should still be broken".into()), async {}).await;
        })
        .await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            EventKind::IssueRecorded(issue) => {
                assert!(matches!(issue.kind, IssueKind::KnownIssueNotRecorded));
                assert!(!issue.is_known);
                assert!(issue.is_failure());
            }
            _ => panic!("expected issue_recorded"),
        }
    }

    #[tokio::test]
    async fn nested_scope_marks_the_inner_not_recorded_issue_known_too() {
        let received = StdArc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));
        let ctx = ExecContext {
            bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: StdArc::new(SystemClock),
            cancellation: CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        ctx.scoped(async {
            with_known_issue(Some("outer".into()), async {
                with_known_issue(Some("inner".into()), async {}).await;
            })
            .await;
        })
        .await;

        // The inner scope's own `known_issue_not_recorded` issue is itself
        // recorded inside the outer scope, so the outer frame marks it known
        // too — the same composition rule any other issue gets.
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            EventKind::IssueRecorded(issue) => {
                assert!(matches!(issue.kind, IssueKind::KnownIssueNotRecorded));
                assert!(issue.is_known);
                assert!(!issue.is_failure());
            }
            _ => panic!("expected issue_recorded"),
        }
    }
}
