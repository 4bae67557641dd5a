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

//! Top-level channel directory: lazily creates and starts one source and
//! one managed connection per channel.

use crate::config::ConnectionOptions;
use crate::connection::supervisor::{ConnectionHandle, ConnectionSupervisor};
use crate::dispatch::channel_source::ChannelSource;
use crate::handler::{IncomingHandler, OutgoingHandler, ReplyHandler};
use crate::message::{ChannelId, ConnectionId, Message};
use crate::observability::events;
use crate::transport::Connector;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

const COMPONENT: &str = "mux_client";

struct ChannelEntry {
    source: Arc<ChannelSource>,
    connections: Vec<ConnectionHandle>,
}

/// Reconnecting, multiplexed client over one transport.
///
/// Holds the sole strong ownership of every channel's source and managed
/// connections; supervisors reference their source only weakly, so dropping
/// the client winds the connections down.
pub struct MuxClient {
    connector: Arc<dyn Connector>,
    options: Arc<ConnectionOptions>,
    channels: Mutex<HashMap<ChannelId, ChannelEntry>>,
}

impl MuxClient {
    /// One shared connector and one immutable options bundle cover every
    /// channel this client serves.
    pub fn new(connector: Arc<dyn Connector>, options: ConnectionOptions) -> Self {
        Self {
            connector,
            options: Arc::new(options),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures a source and managed connection exist for `channel_id` and
    /// returns the connection's control handle.
    ///
    /// Idempotent per channel: the incoming handler of the first
    /// registration wins and later calls return the existing connection.
    pub async fn register(
        &self,
        channel_id: ChannelId,
        incoming: Arc<dyn IncomingHandler>,
    ) -> ConnectionHandle {
        let mut channels = self.channels.lock().await;
        if let Some(entry) = channels.get(&channel_id) {
            debug!(
                event = events::CHANNEL_REUSE,
                component = COMPONENT,
                channel = %channel_id,
                "channel already registered"
            );
            return entry.connections[0].clone();
        }

        let source = Arc::new(ChannelSource::new(
            channel_id.clone(),
            incoming,
            self.options.outgoing_limit,
        ));
        let connection =
            ConnectionSupervisor::spawn(self.connector.clone(), &source, self.options.clone());
        info!(
            event = events::CHANNEL_REGISTER,
            component = COMPONENT,
            channel = %channel_id,
            "channel registered"
        );
        channels.insert(
            channel_id,
            ChannelEntry {
                source,
                connections: vec![connection.clone()],
            },
        );
        connection
    }

    /// Starts an additional redundant connection for an already registered
    /// channel. Outgoing traffic is fanned round-robin across every live
    /// connection of the channel.
    pub async fn add_connection(&self, channel_id: &ChannelId) -> Option<ConnectionHandle> {
        let mut channels = self.channels.lock().await;
        let entry = channels.get_mut(channel_id)?;
        let connection =
            ConnectionSupervisor::spawn(self.connector.clone(), &entry.source, self.options.clone());
        entry.connections.push(connection.clone());
        info!(
            event = events::CHANNEL_LINK_ADDED,
            component = COMPONENT,
            channel = %channel_id,
            links = entry.connections.len(),
            "redundant connection added"
        );
        Some(connection)
    }

    /// Sends `message` on `channel_id`, lazily registering the channel with
    /// an adapter that forwards inbound payloads straight to `reply`.
    ///
    /// A message dropped on backlog overflow is signalled to `reply` as
    /// `None`.
    pub async fn send(
        &self,
        message: Message,
        channel_id: ChannelId,
        reply: Option<Arc<dyn ReplyHandler>>,
    ) {
        let existing = {
            let channels = self.channels.lock().await;
            channels
                .get(&channel_id)
                .map(|entry| entry.connections[0].clone())
        };
        let connection = match existing {
            Some(connection) => connection,
            None => {
                self.register(
                    channel_id,
                    Arc::new(ReplyForwarder {
                        reply: reply.clone(),
                    }),
                )
                .await
            }
        };
        connection.send(message, reply).await;
    }

    pub async fn is_registered(&self, channel_id: &ChannelId) -> bool {
        let channels = self.channels.lock().await;
        channels.contains_key(channel_id)
    }

    pub async fn channel_count(&self) -> usize {
        let channels = self.channels.lock().await;
        channels.len()
    }

    /// Stops every managed connection. Registered channels are retained;
    /// their connections stay down until re-registered on a fresh client.
    pub async fn stop(&self) {
        let channels = self.channels.lock().await;
        info!(
            event = events::CLIENT_STOP,
            component = COMPONENT,
            channels = channels.len(),
            "stopping all connections"
        );
        for entry in channels.values() {
            for connection in &entry.connections {
                connection.stop();
            }
        }
    }
}

/// Adapter installed by lazy registration: forwards inbound payloads to the
/// reply handler, discarding origin and outgoing context.
struct ReplyForwarder {
    reply: Option<Arc<dyn ReplyHandler>>,
}

#[async_trait]
impl IncomingHandler for ReplyForwarder {
    async fn on_receive(
        &self,
        message: Message,
        _origin: ConnectionId,
        _reply: Arc<dyn OutgoingHandler>,
    ) {
        match &self.reply {
            Some(reply) => reply.on_reply(Some(message)).await,
            None => debug!(
                event = events::REPLY_DISCARDED,
                component = COMPONENT,
                msg_len = message.len(),
                "no reply handler; discarding inbound message"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MuxClient;
    use crate::config::ConnectionOptions;
    use crate::handler::{IncomingHandler, OutgoingHandler};
    use crate::message::{ChannelId, ConnectionId, Message};
    use crate::transport::{ConnectionRx, ConnectionTx, Connector, TransportError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoopIncoming;

    #[async_trait]
    impl IncomingHandler for NoopIncoming {
        async fn on_receive(
            &self,
            _message: Message,
            _origin: ConnectionId,
            _reply: Arc<dyn OutgoingHandler>,
        ) {
        }
    }

    /// Never completes a connect attempt; channels stay disconnected.
    struct PendingConnector;

    #[async_trait]
    impl Connector for PendingConnector {
        async fn connect(
            &self,
        ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError> {
            std::future::pending().await
        }
    }

    fn disconnected_client() -> MuxClient {
        MuxClient::new(Arc::new(PendingConnector), ConnectionOptions::default())
    }

    #[tokio::test]
    async fn register_is_idempotent_per_channel() {
        let client = disconnected_client();
        let channel = ChannelId::new("alpha");

        client.register(channel.clone(), Arc::new(NoopIncoming)).await;
        client.register(channel.clone(), Arc::new(NoopIncoming)).await;

        assert!(client.is_registered(&channel).await);
        assert_eq!(client.channel_count().await, 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn send_lazily_registers_an_unknown_channel() {
        let client = disconnected_client();
        let channel = ChannelId::new("lazy");

        assert!(!client.is_registered(&channel).await);
        client
            .send(Message::from_static(b"m1"), channel.clone(), None)
            .await;

        assert!(client.is_registered(&channel).await);
        assert_eq!(client.channel_count().await, 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn add_connection_requires_a_registered_channel() {
        let client = disconnected_client();
        let channel = ChannelId::new("redundant");

        assert!(client.add_connection(&channel).await.is_none());

        client.register(channel.clone(), Arc::new(NoopIncoming)).await;
        assert!(client.add_connection(&channel).await.is_some());

        client.stop().await;
    }
}
