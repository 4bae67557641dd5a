//! Capability traits exchanged between the core and the application.

use crate::message::{ConnectionId, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// A send capability bound to exactly one physical connection.
///
/// Handed to the application as the reply capability of an inbound delivery
/// and registered into a channel's egress rotation while its connection is
/// live. Invoked at most once per dispatch, always with no internal lock
/// held, so implementations may re-enter the core freely.
#[async_trait]
pub trait OutgoingHandler: Send + Sync {
    async fn handle(&self, message: Message);
}

/// Receives every inbound message of one logical channel.
///
/// `origin` identifies the physical connection the message arrived on and
/// `reply` is a send capability bound to that same connection.
#[async_trait]
pub trait IncomingHandler: Send + Sync {
    async fn on_receive(&self, message: Message, origin: ConnectionId, reply: Arc<dyn OutgoingHandler>);
}

/// Completion callback for a single send.
///
/// `Some(message)` carries an inbound payload forwarded by a lazily
/// registered channel; `None` signals the submitted message was dropped
/// before reaching any connection.
#[async_trait]
pub trait ReplyHandler: Send + Sync {
    async fn on_reply(&self, reply: Option<Message>);
}
