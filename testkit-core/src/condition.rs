// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The condition evaluator.
//!
//! `ConditionTrait` is a leaf predicate; [`ConditionExpr`] builds a small
//! AND/OR expression tree over leaves with short-circuit *reporting*
//! semantics: both sides are always evaluated concurrently, but only the
//! first failing side's [`Skip`] is surfaced.
//!
//! Rust doesn't allow overloading `&&`/`||` (they only work on `bool`), so
//! this core exposes `ConditionExpr::and`/`ConditionExpr::or` plus
//! `BitAnd`/`BitOr` (`&`/`|`) operator impls as the closest idiomatic
//! equivalent for composing two conditions — see DESIGN.md for this design
//! note.

use crate::{
    descriptor::TestCase,
    errors::{CapturedError, PrepareOutcome, Skip},
    trait_model::{BoxFuture, SourceLocation, Trait},
};
use std::{fmt, ops::BitAnd, ops::BitOr, sync::Arc};

/// A condition predicate: either a fixed boolean, an async check, or an
/// async check over a specific test case's arguments.
#[derive(Clone)]
pub enum Predicate {
    Constant(bool),
    Async(Arc<dyn Fn() -> BoxFuture<'static, Result<bool, CapturedError>> + Send + Sync>),
    /// Evaluated once per test case rather than once per test, so a
    /// parameterized test can disable a single case (e.g. `x == 3` out of
    /// `[1, 2, 3, 4]`) without disabling its siblings. Absent a case (i.e.
    /// evaluated at the whole-test `prepare` gate), this is treated as
    /// always-true: the decision is deferred to the per-case check.
    AsyncCase(Arc<dyn Fn(TestCase) -> BoxFuture<'static, Result<bool, CapturedError>> + Send + Sync>),
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Constant(b) => f.debug_tuple("Constant").field(b).finish(),
            Predicate::Async(_) => f.write_str("Async(..)"),
            Predicate::AsyncCase(_) => f.write_str("AsyncCase(..)"),
        }
    }
}

/// `enabled`/`disabled`-style leaf condition.
#[derive(Clone, Debug)]
pub struct ConditionTrait {
    predicate: Predicate,
    is_inverted: bool,
    comment: Option<String>,
    source_location: Option<SourceLocation>,
}

impl ConditionTrait {
    pub fn enabled_if(predicate: Predicate) -> Self {
        Self {
            predicate,
            is_inverted: false,
            comment: None,
            source_location: None,
        }
    }

    pub fn disabled_if(predicate: Predicate) -> Self {
        Self {
            predicate,
            is_inverted: true,
            comment: None,
            source_location: None,
        }
    }

    /// `.enabled(if:)` evaluated per case; see [`Predicate::AsyncCase`].
    pub fn enabled_if_case<F>(predicate: F) -> Self
    where
        F: Fn(TestCase) -> BoxFuture<'static, Result<bool, CapturedError>> + Send + Sync + 'static,
    {
        Self::enabled_if(Predicate::AsyncCase(Arc::new(predicate)))
    }

    /// `.disabled(if:)` evaluated per case; see [`Predicate::AsyncCase`].
    pub fn disabled_if_case<F>(predicate: F) -> Self
    where
        F: Fn(TestCase) -> BoxFuture<'static, Result<bool, CapturedError>> + Send + Sync + 'static,
    {
        Self::disabled_if(Predicate::AsyncCase(Arc::new(predicate)))
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_source_location(mut self, location: SourceLocation) -> Self {
        self.source_location = Some(location);
        self
    }

    /// Evaluates the predicate and applies `is_inverted`, producing the
    /// effective boolean plus, if false, the [`Skip`] this leaf would report.
    ///
    /// `case` is `None` at the whole-test `prepare` gate and `Some` when
    /// re-checked per case from [`crate::runner`]; a
    /// [`Predicate::AsyncCase`] leaf defers to `true` in the former and
    /// only takes effect in the latter.
    pub async fn evaluate(&self, case: Option<&TestCase>) -> Result<LeafOutcome, CapturedError> {
        let raw = match &self.predicate {
            Predicate::Constant(b) => *b,
            Predicate::Async(f) => f().await?,
            Predicate::AsyncCase(f) => match case {
                Some(case) => f(case.clone()).await?,
                None => true,
            },
        };
        let value = raw ^ self.is_inverted;
        let skip = if value {
            None
        } else {
            Some(Skip::new(self.comment.clone(), self.source_location.clone()))
        };
        Ok(LeafOutcome { value, skip })
    }
}

/// The result of evaluating a single leaf or an internal node of a
/// [`ConditionExpr`].
#[derive(Clone, Debug)]
pub struct LeafOutcome {
    pub value: bool,
    pub skip: Option<Skip>,
}

/// `Trait = Leaf(ConditionTrait) | And(Trait,Trait) | Or(Trait,Trait)`.
#[derive(Clone, Debug)]
pub enum ConditionExpr {
    Leaf(ConditionTrait),
    And(Box<ConditionExpr>, Box<ConditionExpr>),
    Or(Box<ConditionExpr>, Box<ConditionExpr>),
}

impl ConditionExpr {
    pub fn leaf(condition: ConditionTrait) -> Self {
        ConditionExpr::Leaf(condition)
    }

    pub fn and(self, other: ConditionExpr) -> Self {
        ConditionExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: ConditionExpr) -> Self {
        ConditionExpr::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates this expression tree, polling both sides of a group
    /// concurrently but reporting only the left-preferred failing side's
    /// skip.
    ///
    /// `case` is forwarded unchanged to every leaf; see
    /// [`ConditionTrait::evaluate`].
    pub fn evaluate<'a>(
        &'a self,
        case: Option<&'a TestCase>,
    ) -> BoxFuture<'a, Result<LeafOutcome, CapturedError>> {
        Box::pin(async move {
            match self {
                ConditionExpr::Leaf(c) => c.evaluate(case).await,
                ConditionExpr::And(a, b) => {
                    let (a, b) = tokio::try_join!(a.evaluate(case), b.evaluate(case))?;
                    let value = a.value && b.value;
                    let skip = if value {
                        None
                    } else if !a.value {
                        a.skip
                    } else {
                        b.skip
                    };
                    Ok(LeafOutcome { value, skip })
                }
                ConditionExpr::Or(a, b) => {
                    let (a, b) = tokio::try_join!(a.evaluate(case), b.evaluate(case))?;
                    let value = a.value || b.value;
                    let skip = if value { None } else { a.skip };
                    Ok(LeafOutcome { value, skip })
                }
            }
        })
    }
}

impl BitAnd for ConditionExpr {
    type Output = ConditionExpr;
    fn bitand(self, rhs: ConditionExpr) -> ConditionExpr {
        self.and(rhs)
    }
}

impl BitOr for ConditionExpr {
    type Output = ConditionExpr;
    fn bitor(self, rhs: ConditionExpr) -> ConditionExpr {
        self.or(rhs)
    }
}

impl Trait for ConditionExpr {
    fn prepare<'a>(
        &'a self,
        _test: &'a crate::descriptor::TestDescriptor,
    ) -> BoxFuture<'a, PrepareOutcome> {
        Box::pin(async move {
            match self.evaluate(None).await {
                Ok(outcome) if outcome.value => PrepareOutcome::Continue,
                Ok(outcome) => {
                    PrepareOutcome::Skip(outcome.skip.unwrap_or_else(|| Skip::new(None, None)))
                }
                Err(e) => PrepareOutcome::Failed(e),
            }
        })
    }

    fn prepare_case<'a>(
        &'a self,
        _test: &'a crate::descriptor::TestDescriptor,
        case: &'a TestCase,
    ) -> BoxFuture<'a, PrepareOutcome> {
        Box::pin(async move {
            match self.evaluate(Some(case)).await {
                Ok(outcome) if outcome.value => PrepareOutcome::Continue,
                Ok(outcome) => {
                    PrepareOutcome::Skip(outcome.skip.unwrap_or_else(|| Skip::new(None, None)))
                }
                Err(e) => PrepareOutcome::Failed(e),
            }
        })
    }

    fn comments(&self) -> Vec<String> {
        fn collect(expr: &ConditionExpr, out: &mut Vec<String>) {
            match expr {
                ConditionExpr::Leaf(c) => out.extend(c.comment.clone()),
                ConditionExpr::And(a, b) | ConditionExpr::Or(a, b) => {
                    collect(a, out);
                    collect(b, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

impl crate::trait_model::TestTrait for ConditionExpr {}
impl crate::trait_model::SuiteTrait for ConditionExpr {}
