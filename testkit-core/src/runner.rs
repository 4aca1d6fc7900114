// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Plan Runner.
//!
//! [`PlanRunner::run`] walks a [`crate::descriptor::Plan`] depth-first,
//! applying, at every node: `plan_step_started` → skip/forced-issue check →
//! `prepare` each effective trait in declaration order → (suite) recurse into
//! children through the [`crate::scheduler::WorkGroup`], or (test function)
//! run each case through the timeout scope → `plan_step_ended`. See the
//! per-branch comments below for where each step lands.

use crate::{
    cancellation::CancellationToken,
    clock::{Clock, ClockInstant, SystemClock},
    config::Configuration,
    context::ExecContext,
    descriptor::{Plan, PlanAction, PlanNode, TestDescriptor},
    errors::{CapturedError, ExpectationFailed, PrepareOutcome, RunnerBuildError},
    event::{Event, EventBus, EventKind, Outcome},
    issue::Issue,
    scheduler::{Serializer, WorkGroup, WorkItem},
    scope::run_with_scopes,
    signal::{SignalHandler, SignalHandlerKind},
    stock_traits::{effective_serialization, SerializationMode},
    time_limit::{effective_time_limit, enforce},
    trait_model::{providers, BoxFuture, ErasedTrait, ScopeContext},
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, instrument, warn};

/// Tallies produced by a completed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub tests_skipped: usize,
    pub cases_run: usize,
    pub cases_passed: usize,
    pub cases_failed: usize,
    pub cases_skipped: usize,
    /// Whether a cancellation source fired before the run reached its
    /// natural end.
    pub cancelled: bool,
}

#[derive(Default)]
struct RunCounters {
    tests_run: AtomicUsize,
    tests_passed: AtomicUsize,
    tests_failed: AtomicUsize,
    tests_skipped: AtomicUsize,
    cases_run: AtomicUsize,
    cases_passed: AtomicUsize,
    cases_failed: AtomicUsize,
    cases_skipped: AtomicUsize,
}

impl RunCounters {
    fn record_test(&self, outcome: Outcome) {
        self.tests_run.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Passed => self.tests_passed.fetch_add(1, Ordering::Relaxed),
            Outcome::Failed => self.tests_failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_skipped_test(&self) {
        self.tests_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_case(&self, outcome: Outcome) {
        self.cases_run.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Outcome::Passed => self.cases_passed.fetch_add(1, Ordering::Relaxed),
            Outcome::Failed => self.cases_failed.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_skipped_case(&self) {
        self.cases_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, cancelled: bool) -> RunSummary {
        RunSummary {
            tests_run: self.tests_run.load(Ordering::Relaxed),
            tests_passed: self.tests_passed.load(Ordering::Relaxed),
            tests_failed: self.tests_failed.load(Ordering::Relaxed),
            tests_skipped: self.tests_skipped.load(Ordering::Relaxed),
            cases_run: self.cases_run.load(Ordering::Relaxed),
            cases_passed: self.cases_passed.load(Ordering::Relaxed),
            cases_failed: self.cases_failed.load(Ordering::Relaxed),
            cases_skipped: self.cases_skipped.load(Ordering::Relaxed),
            cancelled,
        }
    }
}

/// Shared, per-run collaborators threaded through the recursive walk.
struct RunnerRuntime {
    /// The single flat concurrency gate actual test-case bodies admit
    /// through (mirrors the teacher's one pool-wide concurrency limit).
    default_pool: Serializer,
    /// Unbounded: coordinates a suite's children (containers recursing into
    /// their own descendants), which never themselves occupy a
    /// `default_pool` slot. A suite/test node's recursive `run_node` call
    /// only does real concurrency-limited work once it reaches a leaf test
    /// case; if container dispatch shared `default_pool`, a node would hold
    /// one of its own ancestor's permits open for its whole subtree while
    /// that subtree's cases try to acquire more permits from the same
    /// semaphore, deadlocking at any bounded width.
    dispatch_pool: Serializer,
    global_serializer: Serializer,
    cancellation: CancellationToken,
    clock: Arc<dyn Clock>,
    counters: RunCounters,
}

/// Builds a [`PlanRunner`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanRunnerBuilder {
    signal_handler_kind: SignalHandlerKind,
}

impl PlanRunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_signal_handler_kind(&mut self, kind: SignalHandlerKind) -> &mut Self {
        self.signal_handler_kind = kind;
        self
    }

    pub fn build(&self) -> Result<PlanRunner, RunnerBuildError> {
        let signal_handler = self
            .signal_handler_kind
            .build()
            .map_err(RunnerBuildError::SignalHandlerSetup)?;
        Ok(PlanRunner { signal_handler })
    }
}

/// Drives a single run of a [`Plan`] to completion.
pub struct PlanRunner {
    signal_handler: SignalHandler,
}

impl PlanRunner {
    /// Runs every node of `plan`, posting events to `configuration`'s handler
    /// and enforcing `configuration`'s time limits and parallelization
    /// policy throughout.
    #[instrument(level = "debug", skip(self, plan, configuration))]
    pub async fn run(mut self, plan: &Plan, configuration: Configuration) -> RunSummary {
        debug!(
            parallelization_enabled = configuration.parallelization_enabled,
            default_parallelization_width = configuration.default_parallelization_width,
            "starting run"
        );
        let bus = EventBus::with_handler(configuration.event_handler.clone());
        let cancellation = CancellationToken::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let default_pool_width = if configuration.parallelization_enabled {
            configuration.default_parallelization_width
        } else {
            1
        };

        let runtime = Arc::new(RunnerRuntime {
            default_pool: Serializer::new(default_pool_width),
            dispatch_pool: Serializer::new(usize::MAX),
            global_serializer: Serializer::serial(),
            cancellation: cancellation.clone(),
            clock,
            counters: RunCounters::default(),
        });

        // The signal watcher runs for the whole duration of the run, firing
        // `cancellation.cancel()` on every incoming shutdown signal; it never
        // forces anything to stop early itself.
        let signal_cancellation = cancellation.clone();
        let mut signal_handler = self.signal_handler;
        let signal_task = tokio::spawn(async move {
            while signal_handler.recv().await.is_some() {
                signal_cancellation.cancel();
            }
        });

        bus.post(Event::new(EventKind::RunStarted, Duration::ZERO));

        configuration
            .clone()
            .scoped(run_node(&plan.root, Arc::new(Vec::new()), bus.clone(), runtime.clone()))
            .await;

        signal_task.abort();

        let cancelled = cancellation.is_cancelled();
        if cancelled {
            warn!("run cancelled; draining in-flight tests");
        }
        bus.post(Event::new(EventKind::RunEnded { cancelled }, Duration::ZERO));

        let summary = runtime.counters.snapshot(cancelled);
        debug!(?summary, "run finished");
        summary
    }
}

/// Pushes a frame onto `bus` that tracks whether any `is_failure` issue
/// passes through it, forwarding every event unchanged.
fn install_failure_counter(bus: &EventBus, failed: Arc<AtomicBool>) -> EventBus {
    bus.push(Arc::new(move |event: Event, outer: &EventBus| {
        if let EventKind::IssueRecorded(issue) = &event.kind {
            if issue.is_failure() {
                failed.store(true, Ordering::Relaxed);
            }
        }
        outer.post(event);
    }))
}

fn post_issue(bus: &EventBus, test_id: &crate::descriptor::TestId, issue: Issue) {
    bus.post(Event::new(EventKind::IssueRecorded(issue), Duration::ZERO).with_test(test_id.clone()));
}

/// Runs a single [`PlanNode`] — suite or test function — to completion,
/// including the skip/forced-issue check and `prepare` step.
fn run_node<'a>(
    node: &'a PlanNode,
    inherited: Arc<Vec<ErasedTrait>>,
    bus: EventBus,
    rt: Arc<RunnerRuntime>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let test = node.descriptor.clone();

        // Step 1: plan_step_started.
        bus.post(Event::new(EventKind::PlanStepStarted, Duration::ZERO).with_test(test.id.clone()));

        match node.action() {
            PlanAction::Skip(skip) => {
                debug!(test = %test.id, reason = ?skip.comment(), "plan action is skip");
                bus.post(
                    Event::new(
                        EventKind::TestSkipped {
                            reason: skip.comment().map(str::to_string),
                        },
                        Duration::ZERO,
                    )
                    .with_test(test.id.clone()),
                );
                if !test.is_suite {
                    rt.counters.record_skipped_test();
                }
                bus.post(
                    Event::new(EventKind::PlanStepEnded { outcome: Outcome::Passed }, Duration::ZERO)
                        .with_test(test.id.clone()),
                );
                return;
            }
            PlanAction::RecordIssue(issue) => {
                let outcome = if issue.is_failure() {
                    Outcome::Failed
                } else {
                    Outcome::Passed
                };
                post_issue(&bus, &test.id, issue);
                if !test.is_suite {
                    rt.counters.record_test(outcome);
                }
                bus.post(
                    Event::new(EventKind::PlanStepEnded { outcome }, Duration::ZERO).with_test(test.id.clone()),
                );
                return;
            }
            PlanAction::Run => {}
        }

        // Step 2 (declaration order): inherited recursive suite traits,
        // followed by this node's own traits.
        let mut effective = (*inherited).clone();
        effective.extend(test.traits.iter().cloned());

        // Step 3: prepare every effective trait in order, short-circuiting
        // on the first `Skip` or `Failed`.
        for t in &effective {
            match t.prepare(&test).await {
                PrepareOutcome::Continue => {}
                PrepareOutcome::Skip(skip) => {
                    debug!(test = %test.id, reason = ?skip.comment(), "prepare requested skip");
                    bus.post(
                        Event::new(
                            EventKind::TestSkipped {
                                reason: skip.comment().map(str::to_string),
                            },
                            Duration::ZERO,
                        )
                        .with_test(test.id.clone()),
                    );
                    if !test.is_suite {
                        rt.counters.record_skipped_test();
                    }
                    bus.post(
                        Event::new(EventKind::PlanStepEnded { outcome: Outcome::Passed }, Duration::ZERO)
                            .with_test(test.id.clone()),
                    );
                    return;
                }
                PrepareOutcome::Failed(err) => {
                    warn!(test = %test.id, error = %err, "prepare failed, skipping body");
                    post_issue(&bus, &test.id, Issue::from_caught_error(&err));
                    if !test.is_suite {
                        rt.counters.record_test(Outcome::Failed);
                    }
                    bus.post(
                        Event::new(EventKind::PlanStepEnded { outcome: Outcome::Failed }, Duration::ZERO)
                            .with_test(test.id.clone()),
                    );
                    return;
                }
            }
        }

        if test.is_suite {
            run_suite(&test, node, effective, bus, rt).await;
        } else {
            run_test(&test, effective, bus, rt).await;
        }
    })
}

/// Step 4 (suite branch): enter the suite's own scope (recursive suite
/// traits excluded, since each will reapply once per contained test), then
/// schedule its children.
async fn run_suite(test: &Arc<TestDescriptor>, node: &PlanNode, effective: Vec<ErasedTrait>, bus: EventBus, rt: Arc<RunnerRuntime>) {
    let next_inherited = Arc::new(
        effective
            .iter()
            .filter(|t| t.is_suite_trait() && t.is_recursive())
            .cloned()
            .collect::<Vec<_>>(),
    );

    let failed = Arc::new(AtomicBool::new(false));
    let suite_bus = install_failure_counter(&bus, failed.clone());

    let provider_list = providers(&effective, test, None);
    let scope_ctx = ScopeContext { test, case: None };

    let children = &node.children;
    let body: BoxFuture<'_, Result<(), CapturedError>> = Box::pin(async {
        run_children(children, next_inherited, suite_bus, rt.clone()).await;
        Ok(())
    });

    let _ = run_with_scopes(&provider_list, &scope_ctx, body).await;

    let outcome = if failed.load(Ordering::Relaxed) {
        Outcome::Failed
    } else {
        Outcome::Passed
    };
    bus.post(Event::new(EventKind::PlanStepEnded { outcome }, Duration::ZERO).with_test(test.id.clone()));
}

/// Runs a suite's children.
///
/// Dispatched through `rt.dispatch_pool` (unbounded), not `rt.default_pool`:
/// a child here is a container or test-function node that will itself
/// recurse and, for a test function, go on to request `default_pool`
/// admission per case. Gating this dispatch step on `default_pool` too would
/// have a node hold one of that same pool's permits for the lifetime of its
/// entire subtree, starving the very cases nested underneath it out of the
/// remaining permits — see `RunnerRuntime::dispatch_pool`'s doc comment.
/// Barrier ordering (serial execution when parallelization is disabled)
/// doesn't depend on which pool is used, since a barrier slice always runs
/// alone regardless of the pool's width.
fn run_children<'a>(
    children: &'a [PlanNode],
    inherited: Arc<Vec<ErasedTrait>>,
    bus: EventBus,
    rt: Arc<RunnerRuntime>,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        let parallel = Configuration::current().parallelization_enabled;
        let items: Vec<WorkItem<'a>> = children
            .iter()
            .map(|child| {
                let fut = run_node(child, inherited.clone(), bus.clone(), rt.clone());
                if parallel {
                    WorkItem::concurrent(fut)
                } else {
                    WorkItem::barrier(fut)
                }
            })
            .collect();
        WorkGroup::run(items, &rt.dispatch_pool, &rt.cancellation).await;
    })
}

/// Step 5 (test-function branch): compute the effective serialization mode,
/// then run every test case through the timeout scope.
async fn run_test(test: &Arc<TestDescriptor>, effective: Vec<ErasedTrait>, bus: EventBus, rt: Arc<RunnerRuntime>) {
    let mode = match effective_serialization(&effective) {
        Ok(mode) => mode,
        Err(err) => {
            post_issue(&bus, &test.id, Issue::from_caught_error(&CapturedError::new(err)));
            rt.counters.record_test(Outcome::Failed);
            bus.post(
                Event::new(EventKind::PlanStepEnded { outcome: Outcome::Failed }, Duration::ZERO)
                    .with_test(test.id.clone()),
            );
            return;
        }
    };

    debug!(test = %test.id, ?mode, "running test");
    let failed = Arc::new(AtomicBool::new(false));
    let test_bus = install_failure_counter(&bus, failed.clone());
    bus.post(Event::new(EventKind::TestStarted, Duration::ZERO).with_test(test.id.clone()));

    // Only a test's own cases are ever made to wait on each other
    // (`.serialized(.locally|.globally)`); sibling tests in the same suite
    // are unaffected.
    let parallel_cases = Configuration::current().parallelization_enabled && mode == SerializationMode::None;
    let pool = match mode {
        SerializationMode::Globally => &rt.global_serializer,
        _ => &rt.default_pool,
    };

    let cases = test.cases();
    let items: Vec<WorkItem<'_>> = cases
        .iter()
        .map(|case| {
            let fut = run_case(test.clone(), case.clone(), effective.clone(), test_bus.clone(), rt.clone());
            if parallel_cases {
                WorkItem::concurrent(fut)
            } else {
                WorkItem::barrier(fut)
            }
        })
        .collect();

    WorkGroup::run(items, pool, &rt.cancellation).await;

    let outcome = if failed.load(Ordering::Relaxed) {
        Outcome::Failed
    } else {
        Outcome::Passed
    };
    rt.counters.record_test(outcome);
    bus.post(Event::new(EventKind::TestEnded { outcome }, Duration::ZERO).with_test(test.id.clone()));
    bus.post(Event::new(EventKind::PlanStepEnded { outcome }, Duration::ZERO).with_test(test.id.clone()));
}

/// Runs one test case: builds its own providers, enters the timeout scope
/// around `run_with_scopes`, and records whichever issue its outcome implies.
fn run_case(
    test: Arc<TestDescriptor>,
    case: crate::descriptor::TestCase,
    effective: Vec<ErasedTrait>,
    bus: EventBus,
    rt: Arc<RunnerRuntime>,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let failed = Arc::new(AtomicBool::new(false));
        let case_bus = install_failure_counter(&bus, failed.clone());

        let ctx = ExecContext {
            bus: case_bus,
            test_id: test.id.clone(),
            test_case_id: Some(case.id().clone()),
            clock: rt.clock.clone(),
            cancellation: rt.cancellation.clone(),
            started_at: rt.clock.now(),
        };

        ctx.scoped(async move {
            // Per-case prepare: most traits never override this, but a
            // condition built with `enabled_if_case`/`disabled_if_case` reads
            // this particular case's arguments, so a single case out of a
            // parameterized test can be skipped without affecting its siblings.
            for t in &effective {
                match t.prepare_case(&test, &case).await {
                    PrepareOutcome::Continue => {}
                    PrepareOutcome::Skip(skip) => {
                        debug!(test = %test.id, case = %case.id(), reason = ?skip.comment(), "prepare_case requested skip");
                        let exec = ExecContext::current();
                        exec.bus.post(
                            Event::new(
                                EventKind::TestSkipped {
                                    reason: skip.comment().map(str::to_string),
                                },
                                Duration::ZERO,
                            )
                            .with_test(test.id.clone())
                            .with_test_case(case.id().clone()),
                        );
                        rt.counters.record_skipped_case();
                        return;
                    }
                    PrepareOutcome::Failed(err) => {
                        // No `TestCaseStarted` has been posted yet (that
                        // only happens once every `prepare_case` has passed,
                        // below), so this must not post `TestCaseEnded`
                        // either — otherwise it would be an ended event with
                        // no matching start. Recording the issue and the
                        // counter is enough; same asymmetry the whole-test
                        // `prepare`-failure branch in `run_node` has against
                        // `PlanStepEnded`.
                        warn!(test = %test.id, case = %case.id(), error = %err, "prepare_case failed, skipping body");
                        post_issue(&bus, &test.id, Issue::from_caught_error(&err));
                        rt.counters.record_case(Outcome::Failed);
                        return;
                    }
                }
            }

            let exec = ExecContext::current();
            exec.bus.post(
                Event::new(EventKind::TestCaseStarted, Duration::ZERO)
                    .with_test(test.id.clone())
                    .with_test_case(case.id().clone()),
            );

            let configuration = Configuration::current();
            match effective_time_limit(&effective, &configuration) {
                Ok(limit) => {
                    let case_providers = providers(&effective, &test, Some(&case));
                    let scope_ctx = ScopeContext { test: &test, case: Some(&case) };
                    let body = (test.body.clone().expect("test function descriptor always has a body"))(case.clone());
                    let case_body: BoxFuture<'_, Result<(), CapturedError>> =
                        Box::pin(run_with_scopes(&case_providers, &scope_ctx, body));
                    if let Err(err) = enforce(limit, case_body).await {
                        if !ExpectationFailed::matches(&err) {
                            Issue::record_error(err);
                        }
                    }
                }
                Err(err) => {
                    Issue::record_error(CapturedError::new(err));
                }
            }

            let outcome = if failed.load(Ordering::Relaxed) {
                Outcome::Failed
            } else {
                Outcome::Passed
            };
            rt.counters.record_case(outcome);
            ExecContext::current().bus.post(
                Event::new(EventKind::TestCaseEnded { outcome }, Duration::ZERO)
                    .with_test(test.id.clone())
                    .with_test_case(case.id().clone()),
            );
        })
        .await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        condition::{ConditionExpr, ConditionTrait, Predicate},
        descriptor::{TestCase, TestId},
        errors::CapturedError,
        time_limit::TimeLimitTrait,
        trait_model::{ErasedTrait, SourceLocation},
    };
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn make_test(
        id: &str,
        traits: Vec<ErasedTrait>,
        body: impl Fn(TestCase) -> BoxFuture<'static, Result<(), CapturedError>> + Send + Sync + 'static,
    ) -> PlanNode {
        let descriptor = Arc::new(TestDescriptor::test(
            TestId::new(id),
            id,
            SourceLocation::new("f", 1, 1),
            traits,
            None,
            Arc::new(body),
        ));
        PlanNode::new(descriptor, Vec::new())
    }

    fn events_bus(log: Arc<Mutex<Vec<EventKind>>>) -> crate::event::HandlerFn {
        Arc::new(move |event, _outer| {
            log.lock().unwrap().push(event.kind);
        })
    }

    #[tokio::test]
    async fn passing_test_reports_test_ended_passed() {
        let _ = tracing_subscriber::fmt::try_init();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut configuration = Configuration::default();
        configuration.event_handler = events_bus(log.clone());

        let root = make_test("t", Vec::new(), |_case| Box::pin(async { Ok(()) }));
        let plan = Plan::build(vec![root]);

        let runner = PlanRunnerBuilder::new()
            .set_signal_handler_kind(SignalHandlerKind::Noop)
            .build()
            .unwrap();
        let summary = runner.run(&plan, configuration).await;

        assert_eq!(summary.tests_run, 1);
        assert_eq!(summary.tests_passed, 1);
        assert_eq!(summary.cases_run, 1);
        assert!(!summary.cancelled);

        let log = log.lock().unwrap();
        assert!(log
            .iter()
            .any(|k| matches!(k, EventKind::TestEnded { outcome: Outcome::Passed })));
    }

    #[tokio::test]
    async fn body_error_is_recorded_and_fails_the_test() {
        #[derive(Debug)]
        struct Boom;
        impl std::fmt::Display for Boom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "boom")
            }
        }
        impl std::error::Error for Boom {}

        let root = make_test("t", Vec::new(), |_case| Box::pin(async { Err(CapturedError::new(Boom)) }));
        let plan = Plan::build(vec![root]);

        let runner = PlanRunnerBuilder::new()
            .set_signal_handler_kind(SignalHandlerKind::Noop)
            .build()
            .unwrap();
        let summary = runner.run(&plan, Configuration::default()).await;

        assert_eq!(summary.tests_failed, 1);
        assert_eq!(summary.cases_failed, 1);
    }

    #[tokio::test]
    async fn disabled_condition_skips_without_running_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let condition = ErasedTrait::from_test_trait(ConditionExpr::leaf(ConditionTrait::enabled_if(
            Predicate::Constant(false),
        )));
        let root = make_test("t", vec![condition], move |_case| {
            let ran = ran_clone.clone();
            Box::pin(async move {
                ran.store(true, Ordering::Relaxed);
                Ok(())
            })
        });
        let plan = Plan::build(vec![root]);

        let runner = PlanRunnerBuilder::new()
            .set_signal_handler_kind(SignalHandlerKind::Noop)
            .build()
            .unwrap();
        let summary = runner.run(&plan, Configuration::default()).await;

        assert_eq!(summary.tests_skipped, 1);
        assert_eq!(summary.tests_run, 0);
        assert!(!ran.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn per_case_condition_skips_one_case_and_runs_the_others() {
        let ran = Arc::new(Mutex::new(Vec::new()));

        let condition = ErasedTrait::from_test_trait(ConditionExpr::leaf(
            ConditionTrait::disabled_if_case(|case| {
                Box::pin(async move {
                    let arg = case
                        .arguments()
                        .and_then(|args| args[0].downcast_ref::<i32>().copied());
                    Ok(arg == Some(3))
                })
            }),
        ));

        let ran_clone = ran.clone();
        let parameters = crate::descriptor::ParameterSource::new(vec![vec![
            Arc::new(1i32) as crate::descriptor::Argument,
            Arc::new(2i32) as crate::descriptor::Argument,
            Arc::new(3i32) as crate::descriptor::Argument,
            Arc::new(4i32) as crate::descriptor::Argument,
        ]]);
        let descriptor = Arc::new(TestDescriptor::test(
            TestId::new("parameterized"),
            "parameterized",
            SourceLocation::new("f", 1, 1),
            vec![condition],
            Some(parameters),
            Arc::new(move |case: TestCase| {
                let ran = ran_clone.clone();
                Box::pin(async move {
                    let arg = case
                        .arguments()
                        .and_then(|args| args[0].downcast_ref::<i32>().copied());
                    ran.lock().unwrap().push(arg.unwrap());
                    Ok(())
                })
            }),
        ));
        let root = PlanNode::new(descriptor, Vec::new());
        let plan = Plan::build(vec![root]);

        let runner = PlanRunnerBuilder::new()
            .set_signal_handler_kind(SignalHandlerKind::Noop)
            .build()
            .unwrap();
        let summary = runner.run(&plan, Configuration::default()).await;

        assert_eq!(summary.cases_run, 3);
        assert_eq!(summary.cases_passed, 3);
        assert_eq!(summary.cases_skipped, 1);

        let mut ran = ran.lock().unwrap().clone();
        ran.sort();
        assert_eq!(ran, vec![1, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_time_limit_fails_the_case_without_a_body_error() {
        let time_limit = ErasedTrait::from_test_trait(TimeLimitTrait::minutes(1));
        let root = make_test("t", vec![time_limit], |_case| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(())
            })
        });
        let plan = Plan::build(vec![root]);

        let runner = PlanRunnerBuilder::new()
            .set_signal_handler_kind(SignalHandlerKind::Noop)
            .build()
            .unwrap();
        let summary = runner.run(&plan, Configuration::default()).await;

        assert_eq!(summary.tests_failed, 1);
    }
}
