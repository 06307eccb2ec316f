//! Ergonomic per-caller handle over [`MessageRouter`]: send, subscribe,
//! broadcast, and awaitable request/reply. Grounded on
//! `original_source/include/voxen/common/message_sender.hpp`.

use super::message_queue::Envelope;
use super::message_router::MessageRouter;
use crate::util::error::MessageError;
use crate::util::uid::Uid;
use std::sync::Arc;

/// A request envelope carrying both the payload and the reply slot the
/// recipient must answer on.
pub struct RequestEnvelope<Req> {
    pub reply_uid: Uid,
    pub message: Req,
}

#[derive(Clone)]
pub struct MessageSender {
    router: Arc<MessageRouter>,
}

impl MessageSender {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self { router }
    }

    pub fn send<T: Send + 'static>(&self, to: Uid, message: T) -> Result<(), MessageError> {
        self.router.send(to, Box::new(message) as Envelope)
    }

    pub fn subscribe(&self, topic: Uid, subscriber: Uid) {
        self.router.subscribe(topic, subscriber)
    }

    pub fn unsubscribe(&self, topic: Uid, subscriber: Uid) {
        self.router.unsubscribe(topic, subscriber)
    }

    pub fn broadcast<T: Clone + Send + 'static>(&self, topic: Uid, message: T) {
        self.router.broadcast(topic, message)
    }

    /// Sends `message` to `to` wrapped with a fresh reply slot, then awaits
    /// a reply of type `Resp`. Resolves to `Err(MessageError::Dropped)` if
    /// the recipient never calls `reply` (e.g. it was torn down first).
    pub async fn request<Req, Resp>(&self, to: Uid, message: Req) -> Result<Resp, MessageError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let (reply_uid, receiver) = self.router.begin_request();
        self.router.send(to, Box::new(RequestEnvelope { reply_uid, message }) as Envelope)?;
        let envelope = receiver.await.map_err(|_| MessageError::Dropped)?;
        envelope
            .downcast::<Resp>()
            .map(|boxed| *boxed)
            .map_err(|_| MessageError::RequestFailed("reply had an unexpected type".into()))
    }

    /// Answers a pending request previously unwrapped from a
    /// `RequestEnvelope<Req>`.
    pub fn reply<Resp: Send + 'static>(&self, reply_uid: Uid, response: Resp) -> Result<(), MessageError> {
        self.router.reply(reply_uid, Box::new(response) as Envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::super::message_router::MessageRouter;
    use super::*;

    #[tokio::test]
    async fn request_is_answered_by_a_concurrently_running_responder() {
        let router = MessageRouter::new();
        let sender = MessageSender::new(router.clone());
        let server_uid = Uid(1);
        let server_queue = router.register(server_uid);
        let server_sender = sender.clone();

        let responder = tokio::spawn(async move {
            loop {
                if let Some(req) = server_queue.try_recv::<RequestEnvelope<u32>>() {
                    server_sender.reply(req.reply_uid, req.message * 2).unwrap();
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
        });

        let reply: u32 = sender.request(server_uid, 21u32).await.unwrap();
        assert_eq!(reply, 42);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn request_to_missing_recipient_fails_immediately() {
        let router = MessageRouter::new();
        let sender = MessageSender::new(router);
        let result: Result<u32, MessageError> = sender.request(Uid(999), 1u32).await;
        assert!(matches!(result, Err(MessageError::RecipientAbsent(Uid(999)))));
    }
}
