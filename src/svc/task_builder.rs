//! Fluent task builder: names a task, gives it a priority hint, and lets it
//! wait on prerequisite counters before running - grounded on
//! `original_source/include/voxen/common/task_builder.hpp`.
//!
//! Every task spawned through [`TaskBuilder`] (or through
//! [`TaskContext::continuation`]) is issued its own completion counter from
//! the task service's [`AsyncCounterTracker`]. [`TaskBuilder::after`] records
//! counter *sequence numbers* to wait on rather than owned handles, so more
//! than one dependent can wait on the same prerequisite - the
//! `addWait(counter)` primitive from spec §4.D. A continuation spawned via
//! [`TaskContext::continuation`] holds its parent's own counter open until it
//! (and anything it in turn spawns) also completes, the fan-in join spec
//! §4.D calls the "continuation invariant".
//!
//! `tokio`'s scheduler has no priority lanes, so `Priority` here only
//! affects ordering among tasks spawned in the same `TaskBuilder` batch
//! (higher priority is spawned first); once spawned, tokio schedules them
//! like any other task.

use super::async_counter_tracker::{AsyncCounterTracker, CompletionToken};
use super::task_service::{TaskHandle, TaskService};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Bookkeeping behind one task's completion counter: its own token, how many
/// outstanding continuations still hold it open, and (for continuations) the
/// parent state to release in turn once this one completes.
struct TaskState {
    token: Mutex<Option<CompletionToken>>,
    outstanding: AtomicU64,
    body_done: AtomicBool,
    parent: Option<Arc<TaskState>>,
}

impl TaskState {
    fn mark_body_done(self: &Arc<Self>) {
        self.body_done.store(true, Ordering::Release);
        self.try_complete();
    }

    /// Completes this task's own counter once its body has returned and
    /// every continuation it spawned has itself fully completed, then
    /// releases one outstanding slot on the parent (if any), recursively.
    fn try_complete(self: &Arc<Self>) {
        if self.body_done.load(Ordering::Acquire) && self.outstanding.load(Ordering::Acquire) == 0 {
            if let Some(token) = self.token.lock().take() {
                token.complete();
            }
            if let Some(parent) = &self.parent {
                parent.outstanding.fetch_sub(1, Ordering::AcqRel);
                parent.try_complete();
            }
        }
    }
}

/// Drops `state`'s body-done flag on scope exit, whether the task body
/// returned normally or panicked - a panicking prerequisite must still
/// release its counter so dependents are not stuck waiting on it forever.
struct CompleteGuard(Arc<TaskState>);

impl Drop for CompleteGuard {
    fn drop(&mut self) {
        self.0.mark_body_done();
    }
}

/// Passed to a task body spawned through [`TaskBuilder`] or
/// [`TaskContext::continuation`]. Lets the body wait on other tasks'
/// counters mid-execution and enqueue continuations against its own.
pub struct TaskContext {
    service: Arc<TaskService>,
    state: Arc<TaskState>,
    sequence: u64,
}

impl TaskContext {
    pub fn service(&self) -> &Arc<TaskService> {
        &self.service
    }

    /// This task's own completion-counter sequence number.
    pub fn counter(&self) -> u64 {
        self.sequence
    }

    /// Suspends until `sequence` completes - `co_await ctx.waitTaskCounter(c)`.
    pub async fn wait_task_counter(&self, sequence: u64) {
        self.service.tracker().wait_async(sequence).await;
    }

    /// Enqueues `body` as a continuation of this task: this task's own
    /// counter will not complete until `body` - and any continuations it in
    /// turn enqueues - also completes.
    pub fn continuation<F, Fut, T>(&self, body: F) -> TaskHandle<T>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.state.outstanding.fetch_add(1, Ordering::AcqRel);
        spawn_task(&self.service, Some(self.state.clone()), body)
    }
}

fn spawn_task<F, Fut, T>(service: &Arc<TaskService>, parent: Option<Arc<TaskState>>, body: F) -> TaskHandle<T>
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let token = service.tracker().begin();
    let sequence = token.sequence();
    let state = Arc::new(TaskState { token: Mutex::new(Some(token)), outstanding: AtomicU64::new(0), body_done: AtomicBool::new(false), parent });
    let ctx = TaskContext { service: service.clone(), state: state.clone(), sequence };
    service.spawn_with_sequence(sequence, async move {
        let _guard = CompleteGuard(state);
        body(ctx).await
    })
}

/// Collects a named task plus the counters it depends on, then spawns it on
/// a [`TaskService`] once every dependency completes.
pub struct TaskBuilder {
    service: Arc<TaskService>,
    name: String,
    priority: Priority,
    waits_for: Vec<u64>,
}

impl TaskBuilder {
    pub fn new(service: Arc<TaskService>, name: impl Into<String>) -> Self {
        Self { service, name: name.into(), priority: Priority::Normal, waits_for: Vec::new() }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Registers a prerequisite counter this task must wait on before its
    /// body runs. Takes a sequence number - from [`TaskHandle::sequence`] or
    /// [`TaskContext::counter`] - rather than an owned handle, so more than
    /// one dependent can wait on the same prerequisite (`addWait(counter)` /
    /// repeated calls model `addWait(span<counter>)`).
    pub fn after(mut self, sequence: u64) -> Self {
        self.waits_for.push(sequence);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority_hint(&self) -> Priority {
        self.priority
    }

    /// Spawns `body`, first waiting on every counter registered with
    /// [`Self::after`]. `body` receives a [`TaskContext`] it can use to wait
    /// on further counters or enqueue continuations of its own.
    pub fn spawn<F, Fut, T>(self, body: F) -> TaskHandle<T>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let waits_for = self.waits_for;
        let service = self.service;
        let tracker: AsyncCounterTracker = service.tracker().clone();
        spawn_task(&service, None, move |ctx| async move {
            for sequence in waits_for {
                tracker.wait_async(sequence).await;
            }
            body(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_runs_only_after_its_dependency_completes() {
        let service = TaskService::new(2).unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o1 = order.clone();
        let dep = TaskBuilder::new(service.clone(), "dep").spawn(move |_ctx| async move {
            o1.lock().push(1);
        });
        let dep_sequence = dep.sequence().unwrap();

        let o2 = order.clone();
        let main = TaskBuilder::new(service.clone(), "main").after(dep_sequence).spawn(move |_ctx| async move {
            o2.lock().push(2);
        });

        service.block_on(main).unwrap();
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn dependency_panic_does_not_prevent_dependent_from_running() {
        let service = TaskService::new(2).unwrap();
        let dep = TaskBuilder::new(service.clone(), "dep").spawn(|_ctx| async {
            panic!("boom");
        });
        let dep_sequence = dep.sequence().unwrap();
        let main = TaskBuilder::new(service.clone(), "main").after(dep_sequence).spawn(|_ctx| async { 7 });
        assert_eq!(service.block_on(main).unwrap(), 7);
    }

    #[test]
    fn a_dependent_can_wait_on_the_same_counter_as_another_dependent() {
        let service = TaskService::new(4).unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o0 = order.clone();
        let dep = TaskBuilder::new(service.clone(), "dep").spawn(move |_ctx| async move {
            o0.lock().push("dep");
        });
        let dep_sequence = dep.sequence().unwrap();

        let o1 = order.clone();
        let first = TaskBuilder::new(service.clone(), "first").after(dep_sequence).spawn(move |_ctx| async move {
            o1.lock().push("first");
        });
        let o2 = order.clone();
        let second = TaskBuilder::new(service.clone(), "second").after(dep_sequence).spawn(move |_ctx| async move {
            o2.lock().push("second");
        });

        service.block_on(async {
            first.await.unwrap();
            second.await.unwrap();
        });

        let recorded = order.lock();
        assert_eq!(recorded[0], "dep");
        assert!(recorded.contains(&"first"));
        assert!(recorded.contains(&"second"));
    }

    #[test]
    fn continuations_defer_the_parent_counters_completion_until_grandchildren_finish() {
        let service = TaskService::new(4).unwrap();
        let tracker = service.tracker().clone();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        let root = TaskBuilder::new(service.clone(), "root").spawn(move |ctx: TaskContext| async move {
            let oa = o.clone();
            let a = ctx.continuation(move |actx: TaskContext| {
                let oa = oa.clone();
                async move {
                    let oga = oa.clone();
                    let g_a = actx.continuation(move |_: TaskContext| async move {
                        oga.lock().push("G_A");
                    });
                    g_a.await.unwrap();
                    oa.lock().push("A");
                }
            });

            let ob = o.clone();
            let b = ctx.continuation(move |bctx: TaskContext| {
                let ob = ob.clone();
                async move {
                    let ogb = ob.clone();
                    let g_b = bctx.continuation(move |_: TaskContext| async move {
                        ogb.lock().push("G_B");
                    });
                    g_b.await.unwrap();
                    ob.lock().push("B");
                }
            });

            a.await.unwrap();
            b.await.unwrap();
            o.lock().push("root-body");
        });

        service.block_on(root).unwrap();

        let recorded = order.lock();
        let pos = |name: &str| recorded.iter().position(|s| *s == name).unwrap();
        assert!(pos("G_A") < pos("A"));
        assert!(pos("A") < pos("root-body"));
        assert!(pos("G_B") < pos("B"));
        assert!(pos("B") < pos("root-body"));
        drop(recorded);

        assert_eq!(tracker.completed_through(), 5, "root's counter only cascades once every continuation and grandchild finish");
    }
}
