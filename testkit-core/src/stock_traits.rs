// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stock traits beyond `ConditionTrait` ([`crate::condition`]),
//! `TimeLimitTrait` ([`crate::time_limit`]), and `IssueHandlingTrait`
//! ([`crate::issue_handling`]): `ParallelizationTrait`, `Bug`, `Comment`,
//! `Tag`, and `AttachmentSavingTrait`.

use crate::{
    errors::UnsupportedSerializationError,
    event::{Event, EventKind},
    issue::Attachment,
    trait_model::{
        BoxFuture, ErasedTrait, ScopeContext, ScopeProvider, SuiteTrait, TestTrait, Trait,
    },
};
use indexmap::IndexMap;
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// How a test (or suite) participates in the Work Scheduler's exclusion
/// rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializationMode {
    /// No special exclusion; parallelizes normally.
    None,
    /// Never overlaps with its own parameterized siblings.
    Locally,
    /// Never overlaps with any other `.serialized(.globally)` test in the
    /// run.
    Globally,
    /// Marked unimplemented upstream; carried
    /// only so [`effective_serialization`] can reject it with a clear error
    /// rather than silently ignoring it.
    WithinGroup(String),
}

/// `.serialized(...)`.
#[derive(Clone, Debug)]
pub struct ParallelizationTrait {
    mode: SerializationMode,
}

impl ParallelizationTrait {
    pub fn serialized_locally() -> Self {
        Self {
            mode: SerializationMode::Locally,
        }
    }

    pub fn serialized_globally() -> Self {
        Self {
            mode: SerializationMode::Globally,
        }
    }

    pub fn serialized_within_group(group: impl Into<String>) -> Self {
        Self {
            mode: SerializationMode::WithinGroup(group.into()),
        }
    }
}

impl Trait for ParallelizationTrait {
    fn serialization_mode(&self) -> Option<SerializationMode> {
        Some(self.mode.clone())
    }
}

impl TestTrait for ParallelizationTrait {}
impl SuiteTrait for ParallelizationTrait {
    const RECURSIVE: bool = true;
}

/// The strictest [`SerializationMode`] in effect for a test, combining its
/// own trait with every inherited ancestor suite trait.
pub fn effective_serialization(
    effective_traits: &[ErasedTrait],
) -> Result<SerializationMode, UnsupportedSerializationError> {
    let mut mode = SerializationMode::None;
    for t in effective_traits {
        if let Some(candidate) = t.serialization_mode() {
            match candidate {
                SerializationMode::WithinGroup(group) => {
                    return Err(UnsupportedSerializationError { group });
                }
                SerializationMode::Globally => mode = SerializationMode::Globally,
                SerializationMode::Locally if mode == SerializationMode::None => {
                    mode = SerializationMode::Locally;
                }
                _ => {}
            }
        }
    }
    Ok(mode)
}

/// A known-bug annotation; pure metadata, no
/// runtime effect beyond appearing in `comments()`.
#[derive(Clone, Debug)]
pub struct Bug {
    identifier: String,
}

impl Bug {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl Trait for Bug {
    fn comments(&self) -> Vec<String> {
        vec![format!("bug: {}", self.identifier)]
    }
}

impl TestTrait for Bug {}
impl SuiteTrait for Bug {
    const RECURSIVE: bool = true;
}

/// A free-text annotation.
#[derive(Clone, Debug)]
pub struct Comment {
    text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Trait for Comment {
    fn comments(&self) -> Vec<String> {
        vec![self.text.clone()]
    }
}

impl TestTrait for Comment {}
impl SuiteTrait for Comment {
    const RECURSIVE: bool = true;
}

/// A discovery-facing label; the core itself only exposes it through
/// `comments()` (grouping/filtering by tag is discovery's job, out of scope
/// here per spec.md §1).
#[derive(Clone, Debug)]
pub struct Tag {
    name: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Trait for Tag {
    fn comments(&self) -> Vec<String> {
        vec![format!("tag: {}", self.name)]
    }
}

impl TestTrait for Tag {}
impl SuiteTrait for Tag {
    const RECURSIVE: bool = true;
}

/// Where [`AttachmentSavingTrait`] deposits attachments it observes, keyed
/// by the test id they were attached under (SPEC_FULL.md §C).
#[derive(Clone, Default)]
pub struct AttachmentStore {
    inner: Arc<Mutex<IndexMap<String, Vec<Attachment>>>>,
}

impl fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentStore").finish_non_exhaustive()
    }
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All attachments saved under `test_id`, in the order they arrived.
    pub fn get(&self, test_id: &str) -> Vec<Attachment> {
        self.inner
            .lock()
            .unwrap()
            .get(test_id)
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, test_id: String, attachment: Attachment) {
        self.inner
            .lock()
            .unwrap()
            .entry(test_id)
            .or_default()
            .push(attachment);
    }
}

/// Copies every `value_attached` event observed within its scope into an
/// [`AttachmentStore`], forwarding all events unchanged (SPEC_FULL.md §C).
#[derive(Clone)]
pub struct AttachmentSavingTrait {
    store: AttachmentStore,
}

impl fmt::Debug for AttachmentSavingTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentSavingTrait").finish_non_exhaustive()
    }
}

impl AttachmentSavingTrait {
    pub fn new(store: AttachmentStore) -> Self {
        Self { store }
    }
}

struct SavingScope {
    store: AttachmentStore,
}

impl ScopeProvider for SavingScope {
    fn provide_scope<'a>(
        &'a self,
        _ctx: &'a ScopeContext<'a>,
        body: BoxFuture<'a, Result<(), crate::errors::CapturedError>>,
    ) -> BoxFuture<'a, Result<(), crate::errors::CapturedError>> {
        Box::pin(async move {
            let outer_ctx = crate::context::ExecContext::current();
            let store = self.store.clone();
            let test_id = outer_ctx.test_id.clone();
            let new_bus = outer_ctx.bus.push(Arc::new(move |event: Event, outer| {
                if let EventKind::ValueAttached(attachment) = &event.kind {
                    store.push(test_id.to_string(), attachment.clone());
                }
                outer.post(event);
            }));
            crate::context::ExecContext::with_bus(new_bus).scoped(body).await
        })
    }
}

impl Trait for AttachmentSavingTrait {
    fn scope_provider(
        &self,
        _test: &crate::descriptor::TestDescriptor,
        _case: Option<&crate::descriptor::TestCase>,
    ) -> Option<Arc<dyn ScopeProvider>> {
        Some(Arc::new(SavingScope {
            store: self.store.clone(),
        }))
    }
}

impl TestTrait for AttachmentSavingTrait {}
impl SuiteTrait for AttachmentSavingTrait {
    const RECURSIVE: bool = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trait_model::ErasedTrait;

    #[test]
    fn global_beats_local_and_within_group_is_rejected() {
        let traits = vec![
            ErasedTrait::from_test_trait(ParallelizationTrait::serialized_locally()),
            ErasedTrait::from_test_trait(ParallelizationTrait::serialized_globally()),
        ];
        assert_eq!(
            effective_serialization(&traits).unwrap(),
            SerializationMode::Globally
        );

        let traits = vec![ErasedTrait::from_test_trait(
            ParallelizationTrait::serialized_within_group("db"),
        )];
        assert!(effective_serialization(&traits).is_err());
    }

    #[test]
    fn no_parallelization_trait_means_unserialized() {
        assert_eq!(effective_serialization(&[]).unwrap(), SerializationMode::None);
    }
}
