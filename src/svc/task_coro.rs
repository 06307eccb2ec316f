//! Coroutine tasks, grounded on
//! `original_source/include/voxen/svc/task_coro.hpp`.
//!
//! The original lowers `co_await`-able task bodies onto hand-rolled C++
//! coroutine promise types (`CoroTaskState`/`CoroSubTaskState`) so a task can
//! suspend itself on `ctx.waitTaskCounter(counter)` mid-execution, and
//! recovers the otherwise-inaccessible context object with the awkward
//! `CoroTaskContext &ctx = co_await CoroTaskContext::current();`. Rust's
//! `async`/`.await` already gives every [`super::TaskBuilder`]-spawned task
//! body this ability directly, and the context is simply a parameter - there
//! is no separate coroutine task type to construct, just an ordinary
//! `async` closure taking a [`CoroTaskContext`] and calling
//! [`CoroTaskContext::wait_task_counter`] wherever the original would
//! `co_await ctx.waitTaskCounter(c)`.

pub use super::task_builder::TaskContext as CoroTaskContext;

#[cfg(test)]
mod tests {
    use super::super::task_builder::TaskBuilder;
    use super::super::task_service::TaskService;
    use super::CoroTaskContext;
    use std::sync::Arc;

    #[test]
    fn a_task_body_can_suspend_on_another_tasks_counter_mid_execution() {
        let service = TaskService::new(2).unwrap();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o1 = order.clone();
        let producer = TaskBuilder::new(service.clone(), "producer").spawn(move |_ctx: CoroTaskContext| async move {
            o1.lock().push("producer");
        });
        let producer_sequence = producer.sequence().unwrap();

        let o2 = order.clone();
        let consumer = TaskBuilder::new(service.clone(), "consumer").spawn(move |ctx: CoroTaskContext| async move {
            // Dynamically discovered dependency, established mid-execution
            // rather than via `TaskBuilder::after` - exactly the scenario
            // `waitTaskCounter` exists for.
            ctx.wait_task_counter(producer_sequence).await;
            o2.lock().push("consumer");
        });

        service.block_on(consumer).unwrap();
        assert_eq!(*order.lock(), vec!["producer", "consumer"]);
    }
}
