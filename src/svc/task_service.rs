//! Task execution service: owns the `tokio` multi-thread runtime that backs
//! every async operation in the engine (coroutine tasks, message delivery,
//! async file I/O), grounded on
//! `original_source/include/voxen/common/task_service.hpp`.
//!
//! The original engine schedules fiber-style tasks across a fixed worker
//! pool; here that pool is `tokio`'s multi-thread scheduler and a "task" is
//! simply a `Future`. [`TaskService::spawn`] is the single entry point used
//! by [`super::task_builder::TaskBuilder`] and [`super::task_coro`].

use super::async_counter_tracker::AsyncCounterTracker;
use crate::util::error::TaskError;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;

/// Owns the worker pool. Typically constructed once at startup and
/// registered with the service locator.
pub struct TaskService {
    runtime: Runtime,
    tracker: AsyncCounterTracker,
}

impl TaskService {
    /// Builds a multi-thread runtime with `worker_threads` workers (0 lets
    /// `tokio` pick based on `num_cpus`).
    pub fn new(worker_threads: usize) -> std::io::Result<Arc<Self>> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all();
        if worker_threads > 0 {
            builder.worker_threads(worker_threads);
        }
        let runtime = builder.build()?;
        Ok(Arc::new(Self { runtime, tracker: AsyncCounterTracker::new() }))
    }

    /// The tracker every [`super::task_builder::TaskBuilder`]-spawned task's
    /// completion counter is issued from.
    pub fn tracker(&self) -> &AsyncCounterTracker {
        &self.tracker
    }

    /// Spawns `future` onto the worker pool, returning a handle that
    /// resolves to `Ok(output)` or `Err(TaskError::Panicked)` if the task
    /// panicked. Carries no completion counter - use
    /// [`super::task_builder::TaskBuilder`] for tasks other tasks need to
    /// wait on.
    pub fn spawn<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        TaskHandle { join: self.runtime.spawn(future), sequence: None }
    }

    /// Like [`Self::spawn`], but tags the handle with the completion counter
    /// sequence number the task was issued (used by `task_builder`).
    pub(crate) fn spawn_with_sequence<F>(&self, sequence: u64, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        TaskHandle { join: self.runtime.spawn(future), sequence: Some(sequence) }
    }

    /// Blocks the calling thread until `future` completes. Used only at
    /// shutdown / from `main`, never from inside a running task.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }
}

/// Handle to a spawned task. Awaiting it yields the task's result or a
/// [`TaskError::Panicked`] if the task's future panicked.
pub struct TaskHandle<T> {
    join: JoinHandle<T>,
    sequence: Option<u64>,
}

impl<T> TaskHandle<T> {
    pub fn abort(&self) {
        self.join.abort();
    }

    /// This task's completion-counter sequence number, if it was spawned
    /// through a [`super::task_builder::TaskBuilder`] (bare
    /// [`TaskService::spawn`] calls carry none).
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        let join = unsafe { self.map_unchecked_mut(|s| &mut s.join) };
        join.poll(cx).map(|result| result.map_err(|e| TaskError::Panicked(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawned_task_returns_its_output() {
        let service = TaskService::new(2).unwrap();
        let handle = service.spawn(async { 21 + 21 });
        let result = service.block_on(handle).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn panicking_task_surfaces_as_task_error() {
        let service = TaskService::new(2).unwrap();
        let handle = service.spawn(async {
            panic!("boom");
            #[allow(unreachable_code)]
            0
        });
        let result = service.block_on(handle);
        assert!(matches!(result, Err(TaskError::Panicked(_))));
    }
}
