/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Per-channel fan-out, backpressure and inbound delivery.

use crate::dispatch::egress_registry::EgressRegistry;
use crate::handler::{IncomingHandler, OutgoingHandler};
use crate::message::{ChannelId, ConnectionId, Message};
use crate::observability::events;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COMPONENT: &str = "channel_source";

/// Failure to deliver or buffer an outgoing message.
pub enum SendError {
    /// The backlog is at capacity. Carries the dropped message back to the
    /// caller; the existing backlog is untouched.
    BacklogFull(Message),
}

impl Debug for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SendError::BacklogFull(message) => write!(f, "BacklogFull({message:?})"),
        }
    }
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SendError::BacklogFull(message) => {
                write!(f, "backlog full; dropped message of {} bytes", message.len())
            }
        }
    }
}

impl Error for SendError {}

/// One logical channel: an egress rotation over the channel's live
/// connections, a bounded FIFO backlog of undeliverable messages, and the
/// channel's inbound delivery callback.
///
/// A source outlives every connection registered to it; connections hold it
/// only through non-owning references.
pub struct ChannelSource {
    channel_id: ChannelId,
    incoming: Arc<dyn IncomingHandler>,
    outgoing_limit: usize,
    egress: EgressRegistry,
    backlog: Mutex<VecDeque<Message>>,
}

impl ChannelSource {
    pub fn new(
        channel_id: ChannelId,
        incoming: Arc<dyn IncomingHandler>,
        outgoing_limit: usize,
    ) -> Self {
        Self {
            channel_id,
            incoming,
            outgoing_limit,
            egress: EgressRegistry::new(),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Number of connections currently registered for dispatch.
    pub async fn live_connections(&self) -> usize {
        self.egress.len().await
    }

    /// True while `conn_id` is registered for dispatch.
    pub async fn has_connection(&self, conn_id: ConnectionId) -> bool {
        self.egress.contains(conn_id).await
    }

    /// The send capability registered for `conn_id`, when live.
    pub async fn outgoing(&self, conn_id: ConnectionId) -> Option<Arc<dyn OutgoingHandler>> {
        self.egress.get(conn_id).await
    }

    /// Number of undelivered messages currently buffered.
    pub async fn backlog_len(&self) -> usize {
        let backlog = self.backlog.lock().await;
        backlog.len()
    }

    /// Registers a live send capability and opportunistically drains the
    /// backlog through it, oldest first.
    ///
    /// The backlog is swapped out under its lock and replayed with the lock
    /// released; an undispatched suffix is re-inserted at the front of the
    /// (possibly concurrently grown) backlog, preserving relative order.
    pub async fn register(&self, conn_id: ConnectionId, handler: Arc<dyn OutgoingHandler>) {
        self.egress.set(conn_id, handler).await;
        debug!(
            event = events::EGRESS_REGISTER,
            component = COMPONENT,
            channel = %self.channel_id,
            conn_id = %conn_id,
            "registered outgoing capability"
        );

        let drained = {
            let mut backlog = self.backlog.lock().await;
            std::mem::take(&mut *backlog)
        };
        if drained.is_empty() {
            return;
        }

        let total = drained.len();
        let mut pending = drained.into_iter();
        let mut stalled = None;
        for message in pending.by_ref() {
            if let Err(returned) = self.egress.dispatch(message).await {
                stalled = Some(returned);
                break;
            }
        }

        let mut leftover: VecDeque<Message> = stalled.into_iter().chain(pending).collect();
        let requeued = leftover.len();
        if requeued > 0 {
            let mut backlog = self.backlog.lock().await;
            while let Some(message) = leftover.pop_back() {
                backlog.push_front(message);
            }
        }

        debug!(
            event = events::BACKLOG_REPLAY,
            component = COMPONENT,
            channel = %self.channel_id,
            conn_id = %conn_id,
            replayed = total - requeued,
            requeued,
            "replayed backlog"
        );
    }

    /// Removes a connection from the egress rotation. The backlog is left
    /// untouched. Idempotent.
    pub async fn unregister(&self, conn_id: ConnectionId) {
        self.egress.remove(conn_id).await;
        debug!(
            event = events::EGRESS_UNREGISTER,
            component = COMPONENT,
            channel = %self.channel_id,
            conn_id = %conn_id,
            "unregistered outgoing capability"
        );
    }

    /// Dispatches `message` round-robin across the live connections; with
    /// none live (or none accepting), buffers it up to the channel's limit.
    ///
    /// At capacity the newly submitted message is dropped: it is logged and
    /// returned to the caller, and the existing backlog stays unchanged.
    pub async fn send(&self, message: Message) -> Result<(), SendError> {
        let returned = match self.egress.dispatch(message).await {
            Ok(()) => return Ok(()),
            Err(returned) => returned,
        };

        let mut backlog = self.backlog.lock().await;
        if backlog.len() < self.outgoing_limit {
            backlog.push_back(returned);
            debug!(
                event = events::BACKLOG_ENQUEUE,
                component = COMPONENT,
                channel = %self.channel_id,
                backlog_len = backlog.len(),
                "no live connection; message buffered"
            );
            Ok(())
        } else {
            let backlog_len = backlog.len();
            drop(backlog);
            warn!(
                event = events::BACKLOG_DROP_OVERFLOW,
                component = COMPONENT,
                channel = %self.channel_id,
                backlog_len,
                limit = self.outgoing_limit,
                msg_len = returned.len(),
                "backlog full; dropping message"
            );
            Err(SendError::BacklogFull(returned))
        }
    }

    /// Forwards an inbound message to the channel's incoming handler with a
    /// reply capability bound to the originating connection.
    pub async fn receive(
        &self,
        message: Message,
        origin: ConnectionId,
        reply: Arc<dyn OutgoingHandler>,
    ) {
        self.incoming.on_receive(message, origin, reply).await;
    }
}
