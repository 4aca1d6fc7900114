// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test descriptors, test cases, and the plan tree.
//!
//! These types are the interface boundary with discovery:
//! the core receives a [`TestDescriptor`] tree built by some external
//! `TestProvider` and never needs to know how test functions were found.

use crate::{
    errors::CapturedError,
    issue::Issue,
    trait_model::{BoxFuture, ErasedTrait, SourceLocation},
};
use smallvec::SmallVec;
use std::{any::Any, fmt, sync::Arc};

/// A stable identity for a [`TestDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestId(Arc<str>);

impl TestId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stable identity for a [`TestCase`], unique across runs for identical
/// arguments.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCaseId(Arc<str>);

impl TestCaseId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single erased test argument, shared cheaply across the cartesian
/// product that produces test cases.
pub type Argument = Arc<dyn Any + Send + Sync>;

/// The (lazy) cartesian product of argument collections for a parameterized
/// test function.
///
/// Each collection is materialized up front (discovery already knows the
/// full set of values for each parameter), but the *product* itself is
/// never materialized: [`ParameterSource::iter`] computes one tuple at a
/// time from a mixed-radix index, the way an odometer counts.
#[derive(Clone, Debug, Default)]
pub struct ParameterSource {
    collections: Arc<Vec<Vec<Argument>>>,
}

impl ParameterSource {
    pub fn new(collections: Vec<Vec<Argument>>) -> Self {
        Self {
            collections: Arc::new(collections),
        }
    }

    /// Total number of cases this parameter source produces.
    pub fn len(&self) -> usize {
        if self.collections.iter().any(|c| c.is_empty()) {
            return 0;
        }
        self.collections.iter().map(Vec::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> CartesianProductIter {
        CartesianProductIter {
            collections: Arc::clone(&self.collections),
            next_index: 0,
            total: self.len(),
        }
    }
}

/// Iterator over the lazy cartesian product of a [`ParameterSource`].
pub struct CartesianProductIter {
    collections: Arc<Vec<Vec<Argument>>>,
    next_index: usize,
    total: usize,
}

impl Iterator for CartesianProductIter {
    type Item = SmallVec<[Argument; 4]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.total {
            return None;
        }
        // Mixed-radix decomposition of `next_index`, last collection varying fastest.
        let mut remainder = self.next_index;
        let mut tuple: SmallVec<[Argument; 4]> = SmallVec::with_capacity(self.collections.len());
        let mut scratch = vec![0usize; self.collections.len()];
        for (i, collection) in self.collections.iter().enumerate().rev() {
            let radix = collection.len();
            scratch[i] = remainder % radix;
            remainder /= radix;
        }
        for (i, collection) in self.collections.iter().enumerate() {
            tuple.push(Arc::clone(&collection[scratch[i]]));
        }
        self.next_index += 1;
        Some(tuple)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next_index;
        (remaining, Some(remaining))
    }
}

/// One invocation of a test function.
#[derive(Clone, Debug)]
pub struct TestCase {
    id: TestCaseId,
    parent: TestId,
    arguments: Option<Arc<SmallVec<[Argument; 4]>>>,
}

impl TestCase {
    /// The single, unnamed case for a non-parameterized test function.
    pub fn unparameterized(parent: TestId) -> Self {
        Self {
            id: TestCaseId::new(format!("{parent}#unparameterized")),
            parent,
            arguments: None,
        }
    }

    pub fn parameterized(id: TestCaseId, parent: TestId, arguments: SmallVec<[Argument; 4]>) -> Self {
        Self {
            id,
            parent,
            arguments: Some(Arc::new(arguments)),
        }
    }

    pub fn id(&self) -> &TestCaseId {
        &self.id
    }

    pub fn parent(&self) -> &TestId {
        &self.parent
    }

    pub fn arguments(&self) -> Option<&[Argument]> {
        self.arguments.as_deref().map(SmallVec::as_slice)
    }
}

/// The async body of a test function.
pub type TestBodyFn =
    Arc<dyn Fn(TestCase) -> BoxFuture<'static, Result<(), CapturedError>> + Send + Sync>;

/// An immutable value describing a single test function or suite.
#[derive(Clone)]
pub struct TestDescriptor {
    pub id: TestId,
    pub name: String,
    pub is_suite: bool,
    pub source_location: SourceLocation,
    pub traits: Vec<ErasedTrait>,
    pub parameters: Option<ParameterSource>,
    pub body: Option<TestBodyFn>,
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_suite", &self.is_suite)
            .field("source_location", &self.source_location)
            .field("traits", &self.traits)
            .field("has_parameters", &self.parameters.is_some())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

impl TestDescriptor {
    /// Builds a suite descriptor (a container, never has a body or parameters).
    pub fn suite(
        id: TestId,
        name: impl Into<String>,
        source_location: SourceLocation,
        traits: Vec<ErasedTrait>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            is_suite: true,
            source_location,
            traits,
            parameters: None,
            body: None,
        }
    }

    /// Builds a test-function descriptor.
    pub fn test(
        id: TestId,
        name: impl Into<String>,
        source_location: SourceLocation,
        traits: Vec<ErasedTrait>,
        parameters: Option<ParameterSource>,
        body: TestBodyFn,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            is_suite: false,
            source_location,
            traits,
            parameters,
            body: Some(body),
        }
    }

    /// Produces the test cases for this descriptor: one unnamed case for a
    /// non-parameterized test, or one per tuple of its cartesian product
    /// of parameter dimensions.
    pub fn cases(&self) -> Vec<TestCase> {
        debug_assert!(!self.is_suite, "suites have no test cases");
        match &self.parameters {
            None => vec![TestCase::unparameterized(self.id.clone())],
            Some(params) => params
                .iter()
                .enumerate()
                .map(|(i, args)| {
                    let case_id = TestCaseId::new(format!("{}#{i}", self.id));
                    TestCase::parameterized(case_id, self.id.clone(), args)
                })
                .collect(),
        }
    }
}

/// The scheduled action for a node in the [`Plan`].
#[derive(Clone, Debug)]
pub enum PlanAction {
    Run,
    Skip(crate::errors::Skip),
    RecordIssue(Issue),
}

/// One node of the [`Plan`] tree.
///
/// The action is wrapped in a `Mutex` because `prepare`
/// mutates it from `Run` to `Skip` while the run is in progress; only the
/// task executing this particular node ever touches its own action, so the
/// lock is never contended.
pub struct PlanNode {
    pub descriptor: Arc<TestDescriptor>,
    action: std::sync::Mutex<PlanAction>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(descriptor: Arc<TestDescriptor>, children: Vec<PlanNode>) -> Self {
        Self {
            descriptor,
            action: std::sync::Mutex::new(PlanAction::Run),
            children,
        }
    }

    pub fn action(&self) -> PlanAction {
        self.action.lock().expect("plan node mutex poisoned").clone()
    }

    pub fn set_action(&self, action: PlanAction) {
        *self.action.lock().expect("plan node mutex poisoned") = action;
    }
}

/// The tree of scheduled tests, built once at the start of a run.
pub struct Plan {
    pub root: PlanNode,
}

impl Plan {
    /// Builds a plan whose root is a synthetic "target" suite wrapping the
    /// discovered top-level suites and test functions.
    pub fn build(top_level: Vec<PlanNode>) -> Self {
        let target = Arc::new(TestDescriptor::suite(
            TestId::new("<target>"),
            "<target>",
            SourceLocation::new("<synthetic>", 0, 0),
            Vec::new(),
        ));
        Self {
            root: PlanNode::new(target, top_level),
        }
    }
}
