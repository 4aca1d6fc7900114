// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core execution runtime for a concurrent unit-testing library.
//!
//! [`trait_model`] and [`condition`] are the trait/condition layer,
//! [`scope`] and [`scheduler`] are the execution engine, [`time_limit`] and
//! [`issue_handling`] are the stock cross-cutting traits' machinery, and
//! [`runner`] ties everything together into the Plan Runner. See
//! `DESIGN.md` at the repository root for how each module is grounded.

pub mod cancellation;
pub mod clock;
pub mod condition;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod errors;
pub mod event;
pub mod issue;
pub mod issue_handling;
pub mod known_issue;
pub mod runner;
pub mod scheduler;
pub mod scope;
pub mod signal;
pub mod stock_traits;
pub mod time_limit;
pub mod trait_model;

pub use config::Configuration;
pub use descriptor::{Plan, PlanAction, TestCase, TestDescriptor, TestId};
pub use errors::CapturedError;
pub use event::{Event, EventBus, EventKind};
pub use issue::{Issue, IssueKind, Severity};
pub use known_issue::with_known_issue;
pub use runner::{PlanRunner, PlanRunnerBuilder, RunSummary};
pub use trait_model::{ErasedTrait, ScopeProvider, SuiteTrait, TestTrait, Trait};
