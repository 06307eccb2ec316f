//! Service substrate (components A-F): memory, object pools, the service
//! locator, task execution, and message passing that everything above this
//! module is built on.

pub mod async_counter_tracker;
pub mod async_file_io;
pub mod main_thread_service;
pub mod message_queue;
pub mod message_router;
pub mod message_sender;
pub mod object_pool;
pub mod pipe_memory;
pub mod service_locator;
pub mod task_builder;
pub mod task_coro;
pub mod task_service;

pub use async_counter_tracker::{AsyncCounterTracker, CompletionToken};
pub use async_file_io::AsyncFileIo;
pub use main_thread_service::{BuildMainThreadService, MainThreadService, MAIN_THREAD_SERVICE_UID};
pub use message_queue::MessageQueue;
pub use message_router::MessageRouter;
pub use message_sender::MessageSender;
pub use object_pool::{PrivateObjectPool, SharedObjectPool};
pub use pipe_memory::{PipeBox, PipeMemoryAllocator};
pub use service_locator::{ServiceBuilder, ServiceLocator};
pub use task_builder::{Priority, TaskBuilder, TaskContext};
pub use task_coro::CoroTaskContext;
pub use task_service::{TaskHandle, TaskService};
