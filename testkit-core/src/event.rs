// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event bus.
//!
//! Modeled as an immutable linked list of handler frames, each captured by
//! value when a scope is entered — there is no
//! shared, mutable, global bus. Posting an event invokes the top frame's
//! handler, which receives a reference to the *outer* bus so it can forward
//! (or suppress) the event, exactly as [`crate::issue_handling`] needs.

use crate::{
    descriptor::{TestCaseId, TestId},
    issue::{Attachment, Issue},
};
use chrono::{DateTime, Local};
use std::{fmt, sync::Arc, time::Duration};

/// The outcome of a test, test case, or plan step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

/// The kind of event posted to the bus.
#[derive(Clone, Debug)]
pub enum EventKind {
    RunStarted,
    TestDiscovered,
    PlanStepStarted,
    PlanStepEnded { outcome: Outcome },
    TestStarted,
    TestEnded { outcome: Outcome },
    TestCaseStarted,
    TestCaseEnded { outcome: Outcome },
    IssueRecorded(Issue),
    ValueAttached(Attachment),
    TestSkipped { reason: Option<String> },
    RunEnded { cancelled: bool },
}

/// `{ kind, instant, test_id?, test_case_id? }`.
#[derive(Clone, Debug)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Local>,
    pub elapsed: Duration,
    pub test_id: Option<TestId>,
    pub test_case_id: Option<TestCaseId>,
}

impl Event {
    pub fn new(kind: EventKind, elapsed: Duration) -> Self {
        Self {
            kind,
            timestamp: Local::now(),
            elapsed,
            test_id: None,
            test_case_id: None,
        }
    }

    pub fn with_test(mut self, test_id: TestId) -> Self {
        self.test_id = Some(test_id);
        self
    }

    pub fn with_test_case(mut self, test_case_id: TestCaseId) -> Self {
        self.test_case_id = Some(test_case_id);
        self
    }
}

/// `EventHandler = (Event, EventContext) -> ()`.
///
/// The context a handler may forward to is just `&EventBus` here, so the
/// handler's second argument plays exactly that role.
pub type HandlerFn = Arc<dyn Fn(Event, &EventBus) + Send + Sync>;

struct Frame {
    handler: HandlerFn,
    outer: EventBus,
}

/// A per-scope, immutable stack of handlers.
#[derive(Clone)]
pub struct EventBus {
    frame: Option<Arc<Frame>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("depth", &self.depth())
            .finish()
    }
}

impl EventBus {
    /// An empty bus with no handler installed; posting to it is a no-op.
    pub fn empty() -> Self {
        Self { frame: None }
    }

    /// A bus with a single top-level handler.
    pub fn with_handler(handler: HandlerFn) -> Self {
        Self::empty().push(handler)
    }

    /// Pushes a new handler on top of this bus, returning the new (inner) bus.
    /// This is how trait scope providers install issue-handling frames
    /// without disturbing the outer bus.
    pub fn push(&self, handler: HandlerFn) -> EventBus {
        EventBus {
            frame: Some(Arc::new(Frame {
                handler,
                outer: self.clone(),
            })),
        }
    }

    /// Invokes the top handler, passing it the outer bus to forward to.
    pub fn post(&self, event: Event) {
        match &self.frame {
            Some(frame) => (frame.handler)(event, &frame.outer),
            None => {}
        }
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.frame.as_ref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.outer.frame.as_ref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc as StdArc, Mutex};

    fn forwarding_handler(log: StdArc<Mutex<Vec<&'static str>>>, tag: &'static str) -> HandlerFn {
        Arc::new(move |event, outer| {
            log.lock().unwrap().push(tag);
            outer.post(event);
        })
    }

    #[test]
    fn handlers_nest_outer_to_inner_forwarding() {
        let log = StdArc::new(Mutex::new(Vec::new()));
        let bus = EventBus::with_handler(forwarding_handler(log.clone(), "outer"));
        let bus = bus.push(forwarding_handler(log.clone(), "inner"));

        bus.post(Event::new(EventKind::RunStarted, Duration::ZERO));

        assert_eq!(*log.lock().unwrap(), vec!["inner", "outer"]);
    }

    #[test]
    fn empty_bus_drops_events_silently() {
        let bus = EventBus::empty();
        bus.post(Event::new(EventKind::RunStarted, Duration::ZERO));
    }
}
