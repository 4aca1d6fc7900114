// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `TimeLimitTrait` and enforcement.
//!
//! Unlike most stock traits, `TimeLimitTrait` doesn't implement
//! [`crate::trait_model::Trait::scope_provider`] — the effective limit for a
//! test is the *minimum* across every inherited `TimeLimitTrait` plus
//! `configuration.default_test_time_limit`, which no single trait instance
//! can compute on its own. Instead it only answers
//! [`crate::trait_model::Trait::time_limit_minutes`], and
//! [`effective_time_limit`]/[`enforce`] are called directly by
//! [`crate::runner`] around `run_with_scopes(case_providers, ...)`, exactly
//! where spec.md §4.6 step 5 places the "timeout scope".

use crate::{
    context::ExecContext,
    errors::{CapturedError, TimeLimitConfigError},
    event::{Event, EventKind},
    issue::{ElapsedComponents, Issue, IssueKind},
    trait_model::{BoxFuture, SuiteTrait, TestTrait, Trait},
};
use std::{fmt, future::Future, time::Duration};

/// A trait carrying a time limit in whole minutes.
#[derive(Clone, Copy, Debug)]
pub struct TimeLimitTrait {
    minutes: u32,
}

impl TimeLimitTrait {
    pub fn minutes(minutes: u32) -> Self {
        Self { minutes }
    }
}

impl Trait for TimeLimitTrait {
    fn time_limit_minutes(&self) -> Option<u32> {
        Some(self.minutes)
    }
}

impl TestTrait for TimeLimitTrait {}
impl SuiteTrait for TimeLimitTrait {
    const RECURSIVE: bool = true;
}

/// Computes the effective time limit for a test from its effective trait
/// list and the ambient configuration.
///
/// Returns `Ok(None)` when neither any inherited `TimeLimitTrait` nor
/// `configuration.default_test_time_limit` is set — such a test has no
/// enforced limit at all.
pub fn effective_time_limit(
    effective_traits: &[crate::trait_model::ErasedTrait],
    configuration: &crate::config::Configuration,
) -> Result<Option<Duration>, TimeLimitConfigError> {
    configuration.validate()?;

    let mut candidates: Vec<Duration> = effective_traits
        .iter()
        .filter_map(|t| t.time_limit_minutes())
        .map(|m| Duration::from_secs(u64::from(m) * 60))
        .collect();
    if let Some(default) = configuration.default_test_time_limit {
        candidates.push(default);
    }

    let Some(minimum) = candidates.into_iter().min() else {
        return Ok(None);
    };

    let rounded = round_up_to_multiple(minimum, configuration.test_time_limit_granularity);
    let clamped = match configuration.maximum_test_time_limit {
        Some(max) => rounded.min(max),
        None => rounded,
    };
    Ok(Some(clamped))
}

fn round_up_to_multiple(value: Duration, unit: Duration) -> Duration {
    let unit_ns = unit.as_nanos().max(1);
    let value_ns = value.as_nanos();
    let units = value_ns.div_ceil(unit_ns);
    let total_ns = units * unit_ns;
    Duration::from_nanos(total_ns.min(u128::from(u64::MAX)) as u64)
}

/// Runs `body` racing a watcher that fires after `limit`.
///
/// On timeout, records a `time_limit_exceeded` issue against the
/// currently-installed context and drops `body` in place (tokio's `select!`
/// cancels the losing branch by dropping its future, the cooperative
/// cancellation spec.md §9 calls for — no forced termination). The body's
/// own `Result` is otherwise passed straight through.
pub async fn enforce<F>(limit: Option<Duration>, body: F) -> Result<(), CapturedError>
where
    F: Future<Output = Result<(), CapturedError>>,
{
    let Some(limit) = limit else {
        return body.await;
    };

    let ctx = ExecContext::current();
    let deadline = ctx.clock.now() + limit;
    let watcher = ctx.clock.sleep_until(deadline);

    tokio::select! {
        result = body => result,
        _ = watcher => {
            let issue = Issue::new(IssueKind::TimeLimitExceeded {
                components: ElapsedComponents::from(limit),
            });
            let mut event = Event::new(EventKind::IssueRecorded(issue), limit)
                .with_test(ctx.test_id.clone());
            if let Some(case_id) = ctx.test_case_id.clone() {
                event = event.with_test_case(case_id);
            }
            ctx.bus.post(event);
            Ok(())
        }
    }
}

impl fmt::Display for TimeLimitTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeLimit(.minutes({}))", self.minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cancellation::CancellationToken,
        clock::SystemClock,
        config::Configuration,
        descriptor::TestId,
        event::EventBus,
        trait_model::ErasedTrait,
    };
    use std::sync::{Arc, Mutex};

    #[test]
    fn effective_limit_is_minimum_rounded_and_clamped() {
        let mut config = Configuration::default();
        config.test_time_limit_granularity = Duration::from_secs(60);
        config.maximum_test_time_limit = Some(Duration::from_secs(300));
        config.default_test_time_limit = Some(Duration::from_secs(600));

        let traits = vec![ErasedTrait::from_test_trait(TimeLimitTrait::minutes(2))];
        let limit = effective_time_limit(&traits, &config).unwrap().unwrap();
        // min(2min, 10min default) = 2min, already a multiple of granularity,
        // then clamped to the 5min maximum (no-op since 2 < 5).
        assert_eq!(limit, Duration::from_secs(120));
    }

    #[test]
    fn no_traits_and_no_default_means_unbounded() {
        let config = Configuration::default();
        assert!(effective_time_limit(&[], &config).unwrap().is_none());
    }

    #[test]
    fn zero_granularity_configuration_is_rejected() {
        let mut config = Configuration::default();
        config.test_time_limit_granularity = Duration::from_secs(1);
        let traits = vec![ErasedTrait::from_test_trait(TimeLimitTrait::minutes(1))];
        assert!(effective_time_limit(&traits, &config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_wins_and_records_one_issue() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));
        let ctx = ExecContext {
            bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: Arc::new(SystemClock),
            cancellation: CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        ctx.scoped(async {
            let result = enforce(Some(Duration::from_millis(10)), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
            assert!(result.is_ok());
        })
        .await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        match &received[0].kind {
            EventKind::IssueRecorded(issue) => {
                assert!(matches!(issue.kind, IssueKind::TimeLimitExceeded { .. }));
                assert!(issue.is_failure());
            }
            _ => panic!("expected issue_recorded"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn body_winning_records_nothing() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        let bus = EventBus::with_handler(Arc::new(move |event, _outer| {
            received_clone.lock().unwrap().push(event);
        }));
        let ctx = ExecContext {
            bus,
            test_id: TestId::new("t"),
            test_case_id: None,
            clock: Arc::new(SystemClock),
            cancellation: CancellationToken::new(),
            started_at: crate::clock::ClockInstant::now(),
        };

        ctx.scoped(async {
            enforce(Some(Duration::from_secs(10)), async { Ok(()) })
                .await
                .unwrap();
        })
        .await;

        assert!(received.lock().unwrap().is_empty());
    }
}
