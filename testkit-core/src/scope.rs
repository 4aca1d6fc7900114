// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nesting scope providers around a test body.
//!
//! `run_with_scopes` is the trampoline: given the ordered provider list from
//! [`crate::trait_model::providers`] and the innermost body, it folds the
//! providers from the inside out so that the first provider in the list ends
//! up outermost — matching the declaration order invariant in spec.md §3/§4.1
//! ("traits wrap execution in declaration order, outermost first").

use crate::{
    errors::CapturedError,
    trait_model::{BoxFuture, ScopeContext, ScopeProvider},
};
use std::sync::Arc;

/// Wraps `body` in each of `providers`, outermost first, and runs the result.
///
/// Recurses on the provider slice rather than looping so that each
/// provider's `provide_scope` genuinely nests around the *next* provider's
/// boxed future, not just around the final body — this is what lets an
/// outer provider observe a panic or early return from an inner one.
pub fn run_with_scopes<'a>(
    providers: &'a [Arc<dyn ScopeProvider>],
    ctx: &'a ScopeContext<'a>,
    body: BoxFuture<'a, Result<(), CapturedError>>,
) -> BoxFuture<'a, Result<(), CapturedError>> {
    match providers.split_first() {
        None => body,
        Some((first, rest)) => {
            let inner = run_with_scopes(rest, ctx, body);
            first.provide_scope(ctx, inner)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{TestCase, TestDescriptor, TestId};
    use crate::trait_model::SourceLocation;
    use std::sync::Mutex;

    struct RecordingScope {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ScopeProvider for RecordingScope {
        fn provide_scope<'a>(
            &'a self,
            _ctx: &'a ScopeContext<'a>,
            body: BoxFuture<'a, Result<(), CapturedError>>,
        ) -> BoxFuture<'a, Result<(), CapturedError>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.tag);
                body.await
            })
        }
    }

    #[tokio::test]
    async fn providers_run_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let providers: Vec<Arc<dyn ScopeProvider>> = vec![
            Arc::new(RecordingScope {
                tag: "outer",
                log: log.clone(),
            }),
            Arc::new(RecordingScope {
                tag: "inner",
                log: log.clone(),
            }),
        ];

        let test = TestDescriptor::test(
            TestId::new("t"),
            "t",
            SourceLocation::new("f", 1, 1),
            Vec::new(),
            None,
            Arc::new(|_case| Box::pin(async { Ok(()) })),
        );
        let case: Option<TestCase> = None;
        let ctx = ScopeContext {
            test: &test,
            case: case.as_ref(),
        };

        let body: BoxFuture<'_, Result<(), CapturedError>> = Box::pin(async {
            log.lock().unwrap().push("body");
            Ok(())
        });

        run_with_scopes(&providers, &ctx, body).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner", "body"]);
    }

    #[tokio::test]
    async fn empty_provider_list_runs_body_directly() {
        let body: BoxFuture<'_, Result<(), CapturedError>> = Box::pin(async { Ok(()) });
        let test = TestDescriptor::test(
            TestId::new("t"),
            "t",
            SourceLocation::new("f", 1, 1),
            Vec::new(),
            None,
            Arc::new(|_case| Box::pin(async { Ok(()) })),
        );
        let case: Option<TestCase> = None;
        let ctx = ScopeContext {
            test: &test,
            case: case.as_ref(),
        };
        run_with_scopes(&[], &ctx, body).await.unwrap();
    }
}
