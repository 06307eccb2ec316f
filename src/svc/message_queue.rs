//! A single recipient's inbox: an unbounded FIFO of type-erased envelopes,
//! grounded on `original_source/include/voxen/common/message_queue.hpp`.
//!
//! Envelopes are `Box<dyn Any + Send>` so [`super::message_router`] can hold
//! one homogeneous channel type per recipient regardless of what message
//! types that recipient actually handles; callers downcast on receive.

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;

pub type Envelope = Box<dyn Any + Send>;

/// Owns the receiving end of a recipient's inbox. The matching [`Sender`] is
/// handed to [`super::message_router::MessageRouter`] for delivery.
pub struct MessageQueue {
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl MessageQueue {
    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> Sender<Envelope> {
        self.sender.clone()
    }

    /// Non-blocking receive. Returns `None` if the queue is empty or the
    /// next envelope isn't a `T` (a logic error on the recipient's part -
    /// the envelope is dropped either way, matching the original's "unknown
    /// message types are discarded with a log warning").
    pub fn try_recv<T: 'static>(&self) -> Option<T> {
        let envelope = self.receiver.try_recv().ok()?;
        match envelope.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(_) => {
                log::warn!("message queue: discarding envelope of unexpected type");
                None
            }
        }
    }

    /// Blocks the calling thread until an envelope of type `T` becomes the
    /// next one in the queue (or the queue is disconnected).
    pub fn recv<T: 'static>(&self) -> Option<T> {
        let envelope = self.receiver.recv().ok()?;
        envelope.downcast::<T>().ok().map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
