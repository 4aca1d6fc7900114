// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The trait model.
//!
//! A [`Trait`] is a polymorphic value with three observable capabilities:
//! `prepare`, `scope_provider`, and `comments`. Concrete trait types (the
//! stock traits in [`crate::stock_traits`], or user-defined ones) implement
//! [`Trait`] directly; [`TestTrait`] and [`SuiteTrait`] are marker traits used
//! only at the point a trait is attached to a descriptor, so that a
//! suite-only trait can't accidentally be attached to a test function and
//! vice versa. Once attached, a trait is erased into an [`ErasedTrait`] and
//! stored on the [`crate::descriptor::TestDescriptor`] — see the design note
//! in spec.md §9 on erasing via a small `dyn` vtable.

use crate::{
    descriptor::{TestCase, TestDescriptor},
    errors::PrepareOutcome,
};
use std::{fmt, future::Future, pin::Pin, sync::Arc};

/// A boxed future, used everywhere an async trait method needs to be object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An opaque, source-derived location.
///
/// The core never interprets this value; it only carries it through to
/// events and issues. How it's produced (macro expansion, `#[track_caller]`,
/// etc.) is the discovery layer's concern and is out of scope here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The context a scope provider is invoked with: the test (or suite) it is
/// wrapping, and the test case, if any.
pub struct ScopeContext<'a> {
    pub test: &'a TestDescriptor,
    pub case: Option<&'a TestCase>,
}

/// A trait-supplied async wrapper around a test body.
///
/// `provide_scope` receives the inner continuation (either the next scope
/// provider or the test body itself) as an already-boxed future and returns
/// a new boxed future that wraps it — this is what lets
/// [`crate::scope::run_with_scopes`] nest providers without recursive
/// `async fn` (which can't be object-safe).
pub trait ScopeProvider: Send + Sync {
    fn provide_scope<'a>(
        &'a self,
        ctx: &'a ScopeContext<'a>,
        body: BoxFuture<'a, Result<(), crate::errors::CapturedError>>,
    ) -> BoxFuture<'a, Result<(), crate::errors::CapturedError>>;
}

/// The full erased vtable capability set a concrete trait type implements.
///
/// See spec.md §9: "erase via a small `dyn` vtable (`prepare_fn`,
/// `scope_provider_fn`, `comments_fn`, `is_recursive`, `is_suite`)". Default
/// methods make every capability optional; most traits only override one or
/// two of them.
pub trait Trait: Send + Sync + fmt::Debug + 'static {
    /// Runs once per test, before any scope is entered.
    fn prepare<'a>(&'a self, _test: &'a TestDescriptor) -> BoxFuture<'a, PrepareOutcome> {
        Box::pin(async { PrepareOutcome::Continue })
    }

    /// Runs once per test *case*, immediately before that case's own scopes
    /// are entered.
    ///
    /// Most traits never override this: a trait attached to a parameterized
    /// test function applies identically to every case, which `prepare`
    /// alone already covers. [`crate::condition::ConditionExpr`] is the
    /// exception — a condition built from
    /// [`crate::condition::ConditionTrait::enabled_if_case`]/`disabled_if_case`
    /// reads the specific case's arguments, so it can disable e.g. `x == 3`
    /// out of a `[1, 2, 3, 4]` parameterization without disabling the other
    /// three cases. See `DESIGN.md` for why this is a second hook rather
    /// than threading a case into `prepare` itself.
    fn prepare_case<'a>(
        &'a self,
        _test: &'a TestDescriptor,
        _case: &'a TestCase,
    ) -> BoxFuture<'a, PrepareOutcome> {
        Box::pin(async { PrepareOutcome::Continue })
    }

    /// Returns a scope provider for this (test, case) pair, or `None` if this
    /// trait doesn't wrap execution for that pair.
    fn scope_provider(
        &self,
        _test: &TestDescriptor,
        _case: Option<&TestCase>,
    ) -> Option<Arc<dyn ScopeProvider>> {
        None
    }

    /// User-facing comments attached to this trait.
    fn comments(&self) -> Vec<String> {
        Vec::new()
    }

    /// True if this trait was attached to a suite (vs. a test function).
    /// Only meaningful in combination with [`Trait::is_recursive`].
    fn is_suite_trait(&self) -> bool {
        false
    }

    /// For suite traits only: whether the trait is also applied once per
    /// contained test function, rather than once for the whole suite.
    fn is_recursive(&self) -> bool {
        false
    }

    /// The time limit this trait contributes, in whole minutes, if it is a
    /// [`crate::time_limit::TimeLimitTrait`].
    ///
    /// Time-limit enforcement is centralized in the runner rather than
    /// implemented as an ordinary scope provider, because the effective
    /// limit is the *minimum* across every inherited `TimeLimitTrait` plus
    /// the configured default — a single trait instance can't compute that
    /// alone. This narrow query hook is the erasure's escape hatch for that
    /// one cross-cutting case.
    fn time_limit_minutes(&self) -> Option<u32> {
        None
    }

    /// The serialization mode this trait contributes, if it is a
    /// [`crate::stock_traits::ParallelizationTrait`].
    ///
    /// Same rationale as [`Trait::time_limit_minutes`]: the effective mode
    /// is the strictest one across every inherited trait, which needs the
    /// whole effective-trait list at once.
    fn serialization_mode(&self) -> Option<crate::stock_traits::SerializationMode> {
        None
    }
}

/// Marker for traits that may be attached to a test function.
pub trait TestTrait: Trait {}

/// Marker for traits that may be attached to a suite.
///
/// `RECURSIVE` fixes [`Trait::is_recursive`] for the erased form; stock
/// traits that are always (or never) recursive set it at the `impl` site
/// instead of per-value, since recursion is a property of the trait *kind*,
/// not of a particular instance.
pub trait SuiteTrait: Trait {
    const RECURSIVE: bool = false;
}

/// A type-erased trait value, as stored on a [`TestDescriptor`].
#[derive(Clone)]
pub struct ErasedTrait {
    inner: Arc<dyn Trait>,
    is_suite_trait: bool,
    is_recursive: bool,
}

impl fmt::Debug for ErasedTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedTrait")
            .field("trait", &self.inner)
            .field("is_suite_trait", &self.is_suite_trait)
            .field("is_recursive", &self.is_recursive)
            .finish()
    }
}

impl ErasedTrait {
    /// Erases a test-function trait.
    pub fn from_test_trait<T: TestTrait>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            is_suite_trait: false,
            is_recursive: false,
        }
    }

    /// Erases a suite trait, recording whether it recurses into contained tests.
    pub fn from_suite_trait<T: SuiteTrait>(value: T) -> Self {
        let is_recursive = T::RECURSIVE;
        Self {
            inner: Arc::new(value),
            is_suite_trait: true,
            is_recursive,
        }
    }

    pub fn is_suite_trait(&self) -> bool {
        self.is_suite_trait
    }

    pub fn is_recursive(&self) -> bool {
        self.is_recursive
    }

    pub fn comments(&self) -> Vec<String> {
        self.inner.comments()
    }

    pub fn prepare<'a>(&'a self, test: &'a TestDescriptor) -> BoxFuture<'a, PrepareOutcome> {
        self.inner.prepare(test)
    }

    pub fn prepare_case<'a>(
        &'a self,
        test: &'a TestDescriptor,
        case: &'a TestCase,
    ) -> BoxFuture<'a, PrepareOutcome> {
        self.inner.prepare_case(test, case)
    }

    pub fn scope_provider(
        &self,
        test: &TestDescriptor,
        case: Option<&TestCase>,
    ) -> Option<Arc<dyn ScopeProvider>> {
        self.inner.scope_provider(test, case)
    }

    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.inner.time_limit_minutes()
    }

    pub fn serialization_mode(&self) -> Option<crate::stock_traits::SerializationMode> {
        self.inner.serialization_mode()
    }
}

/// Computes the ordered list of scope providers for a (test, case) pair.
///
/// `effective_traits` must already be in outer→inner order: inherited
/// recursive suite traits from ancestors, concatenated with `test`'s own
/// traits in declaration order.
pub fn providers(
    effective_traits: &[ErasedTrait],
    test: &TestDescriptor,
    case: Option<&TestCase>,
) -> Vec<Arc<dyn ScopeProvider>> {
    effective_traits
        .iter()
        .filter_map(|t| {
            if case.is_none() {
                if test.is_suite && t.is_suite_trait() && t.is_recursive() {
                    None
                } else {
                    t.scope_provider(test, None)
                }
            } else {
                t.scope_provider(test, case)
            }
        })
        .collect()
}
