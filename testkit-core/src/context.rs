// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-task execution context.
//!
//! The event bus handler stack and the configuration stack are both
//! logically thread-local to the current async task. Tokio's
//! [`tokio::task_local!`] is the idiomatic way to express that: each test
//! case (and each trait's `provide_scope` around it) runs inside
//! `ExecContext::scoped`, so `Issue::record` and friends can reach the
//! ambient bus/cancellation/clock without threading them through every
//! call site.

use crate::{
    cancellation::CancellationToken,
    clock::{Clock, ClockInstant},
    descriptor::{TestCaseId, TestId},
    event::EventBus,
};
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: ExecContext;
}

/// The ambient state visible to a running test body, scope provider, or
/// condition predicate.
#[derive(Clone)]
pub struct ExecContext {
    pub bus: EventBus,
    pub test_id: TestId,
    pub test_case_id: Option<TestCaseId>,
    pub clock: Arc<dyn Clock>,
    pub cancellation: CancellationToken,
    /// When this test case started, used to compute `elapsed` for events
    /// posted ad hoc from within a test body (`Issue::record`, `attach`).
    pub started_at: ClockInstant,
}

impl ExecContext {
    /// Runs `fut` with `self` installed as the current context.
    pub async fn scoped<F>(self, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// Returns a copy of the currently installed context, with `bus`
    /// replaced — used by issue-handling scopes to push a new frame without
    /// otherwise disturbing the context.
    pub fn with_bus(bus: EventBus) -> Self {
        let mut ctx = Self::current();
        ctx.bus = bus;
        ctx
    }

    /// The context for the currently running test/scope, if any is installed.
    pub fn current() -> ExecContext {
        CURRENT.with(|c| c.clone())
    }

    /// Like [`ExecContext::current`], but doesn't panic outside a scope.
    pub fn try_current() -> Option<ExecContext> {
        CURRENT.try_with(|c| c.clone()).ok()
    }

    /// Elapsed time since this test case started, per the ambient clock.
    pub fn elapsed(&self) -> std::time::Duration {
        self.clock.now().saturating_duration_since(self.started_at)
    }
}
