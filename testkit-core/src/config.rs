// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-local configuration stack.
//!
//! File/TOML loading is out of scope here — a host CLI builds a
//! [`Configuration`] programmatically (or by deserializing one itself, since
//! the `Duration` fields derive `serde`) and hands it to
//! [`crate::runner::PlanRunner::run`]. The "stack" part of "configuration
//! stack" mirrors the event bus: it's a `tokio::task_local!`, logically
//! thread-local to the running task.

use crate::event::HandlerFn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The minimum granularity allowed for [`Configuration::test_time_limit_granularity`].
pub const MINIMUM_GRANULARITY: Duration = Duration::from_secs(60);

/// Process-wide knobs for a run.
#[derive(Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// Master switch for concurrent execution.
    pub parallelization_enabled: bool,
    /// Target concurrency when parallelization is enabled.
    ///
    /// Default: the `MAX_PARALLELIZATION_WIDTH` environment variable if set
    /// and parseable, else `usize::MAX`.
    pub default_parallelization_width: usize,
    /// Applied when a test has no `TimeLimitTrait` of its own.
    #[serde(with = "option_duration_secs")]
    pub default_test_time_limit: Option<Duration>,
    /// Rounding unit for effective time limits; must be at least one minute.
    #[serde(with = "duration_secs")]
    pub test_time_limit_granularity: Duration,
    /// Upper bound an effective time limit is clamped to.
    #[serde(with = "option_duration_secs")]
    pub maximum_test_time_limit: Option<Duration>,
    /// The initial top-of-stack event handler.
    #[serde(skip, default = "default_event_handler")]
    pub event_handler: HandlerFn,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("parallelization_enabled", &self.parallelization_enabled)
            .field(
                "default_parallelization_width",
                &self.default_parallelization_width,
            )
            .field("default_test_time_limit", &self.default_test_time_limit)
            .field(
                "test_time_limit_granularity",
                &self.test_time_limit_granularity,
            )
            .field("maximum_test_time_limit", &self.maximum_test_time_limit)
            .finish_non_exhaustive()
    }
}

fn default_event_handler() -> HandlerFn {
    std::sync::Arc::new(|_event, _outer| {})
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            parallelization_enabled: true,
            default_parallelization_width: default_parallelization_width_from_env(),
            default_test_time_limit: None,
            test_time_limit_granularity: MINIMUM_GRANULARITY,
            maximum_test_time_limit: None,
            event_handler: default_event_handler(),
        }
    }
}

fn default_parallelization_width_from_env() -> usize {
    std::env::var("MAX_PARALLELIZATION_WIDTH")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX)
}

impl Configuration {
    /// Validates that the granularity is at least [`MINIMUM_GRANULARITY`].
    pub fn validate(&self) -> Result<(), crate::errors::TimeLimitConfigError> {
        if self.test_time_limit_granularity < MINIMUM_GRANULARITY {
            return Err(crate::errors::TimeLimitConfigError::ZeroGranularity);
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

tokio::task_local! {
    static CURRENT: Configuration;
}

impl Configuration {
    /// Runs `fut` with `self` installed as the ambient configuration.
    pub async fn scoped<F: std::future::Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    pub fn current() -> Configuration {
        CURRENT.with(|c| c.clone())
    }

    pub fn try_current() -> Option<Configuration> {
        CURRENT.try_with(|c| c.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_granularity_is_rejected() {
        let mut config = Configuration::default();
        config.test_time_limit_granularity = Duration::from_secs(30);
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_granularity_is_valid() {
        assert!(Configuration::default().validate().is_ok());
    }

    #[tokio::test]
    async fn configuration_is_task_local() {
        let mut config = Configuration::default();
        config.default_parallelization_width = 4;
        config
            .scoped(async {
                assert_eq!(Configuration::current().default_parallelization_width, 4);
            })
            .await;
        assert!(Configuration::try_current().is_none());
    }
}
