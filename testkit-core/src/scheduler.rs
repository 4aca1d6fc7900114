// Copyright (c) The testkit-core Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Work Scheduler.
//!
//! Two cooperating primitives:
//!
//! - [`Serializer`]: an admission gate bounding how many work items run at
//!   once. `max_width = 1` is strict serial execution (used for the global
//!   serializer backing `.serialized(.globally)`); larger widths back the
//!   default parallel pool.
//! - [`WorkGroup`]: runs a suite's children in declaration order, batching
//!   consecutive non-barrier items into concurrent "slices" and running each
//!   barrier item alone once every earlier slice has finished. This is
//!   modeled as a queue of pre-partitioned
//!   `{ Concurrent(Vec<Continuation>), Barrier(Continuation) }` slices, which
//!   is exactly how [`WorkGroup::run`] is implemented: the full child list is
//!   known up front (it comes from the already-built [`crate::descriptor::Plan`]),
//!   so there's no need for an actor/queue that admits items one at a time.

use crate::{cancellation::CancellationToken, errors::SchedulerShutdownError};
use futures::future::join_all;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::Semaphore;

/// Bounded admission: at most `max_width` callers run concurrently, the rest
/// queue FIFO on the semaphore.
#[derive(Clone)]
pub struct Serializer {
    semaphore: Option<Arc<Semaphore>>,
    shutdown: Arc<AtomicBool>,
}

impl Serializer {
    /// `max_width = usize::MAX` is treated as unbounded (no admission gate
    /// at all).
    pub fn new(max_width: usize) -> Self {
        Self {
            semaphore: (max_width != usize::MAX).then(|| Arc::new(Semaphore::new(max_width))),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Strict serial execution: `max_width = 1`.
    pub fn serial() -> Self {
        Self::new(1)
    }

    /// Runs `fut` once a slot is free, or returns
    /// [`SchedulerShutdownError`] if [`Serializer::shutdown`] was already
    /// called.
    pub async fn run<F: std::future::Future>(&self, fut: F) -> Result<F::Output, SchedulerShutdownError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerShutdownError);
        }
        match &self.semaphore {
            Some(semaphore) => {
                let permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| SchedulerShutdownError)?;
                let output = fut.await;
                drop(permit);
                Ok(output)
            }
            None => Ok(fut.await),
        }
    }

    /// Refuses all future admission; in-flight work is unaffected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(semaphore) = &self.semaphore {
            semaphore.close();
        }
    }
}

/// One child of a suite, tagged with how it participates in scheduling:
/// concurrently with its neighbors, or as a barrier that waits for every
/// earlier item before it runs alone.
///
/// Parameterized over a lifetime rather than fixed to `'static`: a suite's
/// children are driven directly off the borrowed [`crate::descriptor::Plan`]
/// tree, and since [`WorkGroup::run`] only ever awaits these tasks locally
/// (never spawns them onto a separate executor task), there's no need to
/// force ownership the way `tokio::spawn` would.
pub struct WorkItem<'a> {
    pub is_barrier: bool,
    pub task: crate::trait_model::BoxFuture<'a, ()>,
}

impl<'a> WorkItem<'a> {
    pub fn concurrent(task: crate::trait_model::BoxFuture<'a, ()>) -> Self {
        Self {
            is_barrier: false,
            task,
        }
    }

    pub fn barrier(task: crate::trait_model::BoxFuture<'a, ()>) -> Self {
        Self {
            is_barrier: true,
            task,
        }
    }
}

enum Slice<'a> {
    Concurrent(Vec<crate::trait_model::BoxFuture<'a, ()>>),
    Barrier(crate::trait_model::BoxFuture<'a, ()>),
}

fn partition(items: Vec<WorkItem<'_>>) -> Vec<Slice<'_>> {
    let mut slices = Vec::new();
    let mut current: Vec<crate::trait_model::BoxFuture<'_, ()>> = Vec::new();
    for item in items {
        if item.is_barrier {
            if !current.is_empty() {
                slices.push(Slice::Concurrent(std::mem::take(&mut current)));
            }
            slices.push(Slice::Barrier(item.task));
        } else {
            current.push(item.task);
        }
    }
    if !current.is_empty() {
        slices.push(Slice::Concurrent(current));
    }
    slices
}

/// Runs a suite's children in declaration order, respecting barriers: each
/// [`Slice::Concurrent`] batch runs together, and a [`Slice::Barrier`] item
/// waits for the prior batch before running alone.
pub struct WorkGroup;

impl WorkGroup {
    /// Runs `items` against `pool`, stopping early (without starting
    /// further slices) once `cancellation` fires — items already admitted
    /// into a slice still run to their own next cooperative cancellation
    /// point.
    pub async fn run(items: Vec<WorkItem<'_>>, pool: &Serializer, cancellation: &CancellationToken) {
        for slice in partition(items) {
            if cancellation.is_cancelled() {
                break;
            }
            match slice {
                Slice::Concurrent(tasks) => {
                    let futures = tasks.into_iter().map(|task| pool.run(task));
                    let _ = join_all(futures).await;
                }
                Slice::Barrier(task) => {
                    let _ = pool.run(task).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn serial_serializer_admits_one_at_a_time() {
        let serializer = Serializer::serial();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let serializer = serializer.clone();
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                serializer
                    .run(async move {
                        log.lock().unwrap().push(format!("enter {i}"));
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        log.lock().unwrap().push(format!("exit {i}"));
                    })
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let log = log.lock().unwrap();
        // Every enter must be immediately followed by its own exit: no
        // interleaving of two different indices' enter/exit pairs.
        for pair in log.chunks(2) {
            let enter = &pair[0];
            let exit = &pair[1];
            let idx = enter.trim_start_matches("enter ");
            assert_eq!(exit, &format!("exit {idx}"));
        }
    }

    #[tokio::test]
    async fn shutdown_rejects_further_admission() {
        let serializer = Serializer::new(2);
        serializer.shutdown();
        let result = serializer.run(async {}).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn barrier_runs_after_prior_slice_and_before_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = Serializer::new(usize::MAX);
        let cancellation = CancellationToken::new();

        let mk = |tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
            Box::pin(async move {
                log.lock().unwrap().push(tag);
            }) as crate::trait_model::BoxFuture<'static, ()>
        };

        let items = vec![
            WorkItem::concurrent(mk("a", log.clone())),
            WorkItem::concurrent(mk("b", log.clone())),
            WorkItem::barrier(mk("barrier", log.clone())),
            WorkItem::concurrent(mk("c", log.clone())),
        ];

        WorkGroup::run(items, &pool, &cancellation).await;

        let log = log.lock().unwrap();
        let barrier_pos = log.iter().position(|t| *t == "barrier").unwrap();
        let c_pos = log.iter().position(|t| *t == "c").unwrap();
        assert!(barrier_pos < c_pos);
        assert!(log[..barrier_pos].iter().all(|t| *t == "a" || *t == "b"));
    }

    #[tokio::test]
    async fn cancellation_stops_scheduling_further_slices() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = Serializer::new(usize::MAX);
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let mk = |tag: &'static str, log: Arc<Mutex<Vec<&'static str>>>| {
            Box::pin(async move {
                log.lock().unwrap().push(tag);
            }) as crate::trait_model::BoxFuture<'static, ()>
        };

        let items = vec![WorkItem::concurrent(mk("a", log.clone()))];
        WorkGroup::run(items, &pool, &cancellation).await;

        assert!(log.lock().unwrap().is_empty());
    }
}
