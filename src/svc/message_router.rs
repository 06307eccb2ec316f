//! Message router: sharded per-recipient delivery plus broadcast topics and
//! request/reply bookkeeping, grounded on
//! `original_source/include/voxen/common/message_router.hpp`.
//!
//! Recipient inboxes are spread across a fixed number of lock shards (keyed
//! by `uid % SHARD_COUNT`) so registering/sending to unrelated recipients
//! doesn't contend on one global lock. Broadcast (open question, resolved
//! in `SPEC_FULL.md` §6) is explicit subscription: a recipient subscribes to
//! a topic uid, and a broadcast delivers a clone of the message to every
//! current subscriber.

use super::message_queue::{Envelope, MessageQueue};
use crate::util::error::MessageError;
use crate::util::uid::Uid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SHARD_COUNT: usize = 16;
/// Reply-slot uids are tagged with the high bit so they can never collide
/// with a recipient uid a caller registered directly.
const REPLY_UID_TAG: u64 = 1 << 63;

#[derive(Default)]
struct Shard {
    inboxes: Mutex<HashMap<Uid, crossbeam_channel::Sender<Envelope>>>,
}

pub struct MessageRouter {
    shards: Vec<Shard>,
    subscribers: Mutex<HashMap<Uid, Vec<Uid>>>,
    pending_requests: Mutex<HashMap<Uid, tokio::sync::oneshot::Sender<Envelope>>>,
    next_reply_id: AtomicU64,
}

impl MessageRouter {
    pub fn new() -> Arc<Self> {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        shards.resize_with(SHARD_COUNT, Shard::default);
        Arc::new(Self {
            shards,
            subscribers: Mutex::new(HashMap::new()),
            pending_requests: Mutex::new(HashMap::new()),
            next_reply_id: AtomicU64::new(1),
        })
    }

    fn shard_for(&self, uid: Uid) -> &Shard {
        &self.shards[(uid.0 as usize) % SHARD_COUNT]
    }

    /// Registers `uid` as a recipient and returns its inbox.
    pub fn register(&self, uid: Uid) -> MessageQueue {
        let queue = MessageQueue::unbounded();
        self.shard_for(uid).inboxes.lock().insert(uid, queue.sender());
        queue
    }

    pub fn unregister(&self, uid: Uid) {
        self.shard_for(uid).inboxes.lock().remove(&uid);
        self.subscribers.lock().values_mut().for_each(|subs| subs.retain(|s| *s != uid));
    }

    pub fn send(&self, to: Uid, envelope: Envelope) -> Result<(), MessageError> {
        let inboxes = self.shard_for(to).inboxes.lock();
        let sender = inboxes.get(&to).ok_or(MessageError::RecipientAbsent(to))?;
        sender.send(envelope).map_err(|_| MessageError::RecipientAbsent(to))
    }

    pub fn subscribe(&self, topic: Uid, subscriber: Uid) {
        self.subscribers.lock().entry(topic).or_default().push(subscriber);
    }

    pub fn unsubscribe(&self, topic: Uid, subscriber: Uid) {
        if let Some(subs) = self.subscribers.lock().get_mut(&topic) {
            subs.retain(|s| *s != subscriber);
        }
    }

    /// Delivers a clone of `value` to every subscriber of `topic`.
    /// Unreachable subscribers (dropped inbox) are skipped, not an error -
    /// matching spec §4.E "broadcast is best-effort per recipient".
    pub fn broadcast<T: Clone + Send + 'static>(&self, topic: Uid, value: T) {
        let subscribers = self.subscribers.lock().get(&topic).cloned().unwrap_or_default();
        for subscriber in subscribers {
            let _ = self.send(subscriber, Box::new(value.clone()));
        }
    }

    /// Reserves a reply slot. The returned uid must be embedded in the
    /// outgoing request so the recipient can call [`Self::reply`].
    pub fn begin_request(&self) -> (Uid, tokio::sync::oneshot::Receiver<Envelope>) {
        let id = self.next_reply_id.fetch_add(1, Ordering::Relaxed);
        let reply_uid = Uid(REPLY_UID_TAG | id);
        let (sender, receiver) = tokio::sync::oneshot::channel();
        self.pending_requests.lock().insert(reply_uid, sender);
        (reply_uid, receiver)
    }

    /// Completes a pending request. Returns `Err(Dropped)` if the requester
    /// already gave up (its receiver was dropped) or the slot doesn't exist.
    pub fn reply(&self, reply_uid: Uid, envelope: Envelope) -> Result<(), MessageError> {
        let sender = self.pending_requests.lock().remove(&reply_uid).ok_or(MessageError::Dropped)?;
        sender.send(envelope).map_err(|_| MessageError::Dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_delivers_to_registered_recipient() {
        let router = MessageRouter::new();
        let queue = router.register(Uid(1));
        router.send(Uid(1), Box::new(99u32)).unwrap();
        assert_eq!(queue.try_recv::<u32>(), Some(99));
    }

    #[test]
    fn send_to_unregistered_recipient_fails() {
        let router = MessageRouter::new();
        let err = router.send(Uid(42), Box::new(1u32)).unwrap_err();
        assert!(matches!(err, MessageError::RecipientAbsent(Uid(42))));
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let router = MessageRouter::new();
        let q1 = router.register(Uid(1));
        let q2 = router.register(Uid(2));
        router.subscribe(Uid(100), Uid(1));
        router.subscribe(Uid(100), Uid(2));

        router.broadcast(Uid(100), "tick".to_string());

        assert_eq!(q1.try_recv::<String>(), Some("tick".to_string()));
        assert_eq!(q2.try_recv::<String>(), Some("tick".to_string()));
    }

    #[test]
    fn unsubscribe_stops_future_broadcasts() {
        let router = MessageRouter::new();
        let q1 = router.register(Uid(1));
        router.subscribe(Uid(100), Uid(1));
        router.unsubscribe(Uid(100), Uid(1));
        router.broadcast(Uid(100), 1u32);
        assert!(q1.is_empty());
    }

    #[tokio::test]
    async fn request_reply_round_trips() {
        let router = MessageRouter::new();
        let (reply_uid, receiver) = router.begin_request();
        router.reply(reply_uid, Box::new(String::from("pong"))).unwrap();
        let envelope = receiver.await.unwrap();
        assert_eq!(*envelope.downcast::<String>().unwrap(), "pong");
    }
}
