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

//! # remux-client
//!
//! `remux-client` is a reconnecting, multiplexed network client core. It
//! manages logical communication channels served by one or more redundant
//! physical connections, fans outgoing traffic round-robin across whichever
//! connections are currently live, buffers a bounded backlog of
//! undeliverable messages, and drops overflow with diagnostics. Each
//! connection independently reconnects on failure with a rate-limited
//! spacing tied to wall-clock elapsed time.
//!
//! Payloads are opaque [`Message`] byte buffers: the core defines no
//! framing, encryption or parsing. Sockets, timers below `tokio::time`, and
//! address selection belong to the [`Connector`] collaborator supplied by
//! the embedding application.
//!
//! ## Quick start
//!
//! ```
//! use async_trait::async_trait;
//! use remux_client::{
//!     ChannelId, ConnectionId, ConnectionOptions, ConnectionRx, ConnectionTx, Connector,
//!     IncomingHandler, Message, MuxClient, OutgoingHandler, TransportError,
//! };
//! use std::sync::Arc;
//!
//! // A loopback transport: everything written comes straight back.
//! struct Loopback;
//! struct LoopbackTx(tokio::sync::mpsc::UnboundedSender<Message>);
//! struct LoopbackRx(tokio::sync::mpsc::UnboundedReceiver<Message>);
//!
//! #[async_trait]
//! impl Connector for Loopback {
//!     async fn connect(
//!         &self,
//!     ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError> {
//!         let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
//!         Ok((Box::new(LoopbackTx(tx)), Box::new(LoopbackRx(rx))))
//!     }
//! }
//!
//! #[async_trait]
//! impl ConnectionTx for LoopbackTx {
//!     async fn send(&mut self, message: Message) -> Result<(), TransportError> {
//!         self.0
//!             .send(message)
//!             .map_err(|_| TransportError::Io("loopback closed".to_string()))
//!     }
//! }
//!
//! #[async_trait]
//! impl ConnectionRx for LoopbackRx {
//!     async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
//!         Ok(self.0.recv().await)
//!     }
//! }
//!
//! struct PrintIncoming;
//!
//! #[async_trait]
//! impl IncomingHandler for PrintIncoming {
//!     async fn on_receive(
//!         &self,
//!         message: Message,
//!         origin: ConnectionId,
//!         _reply: Arc<dyn OutgoingHandler>,
//!     ) {
//!         println!("{origin}: {} bytes", message.len());
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let client = MuxClient::new(Arc::new(Loopback), ConnectionOptions::default());
//! client
//!     .register(ChannelId::new("telemetry"), Arc::new(PrintIncoming))
//!     .await;
//! client
//!     .send(Message::from_static(b"ping"), ChannelId::new("telemetry"), None)
//!     .await;
//! client.stop().await;
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - API facade: [`MuxClient`], the channel directory
//! - Dispatch plane: per-channel fan-out, round-robin rotation and the
//!   bounded backlog ([`ChannelSource`])
//! - Connection plane: the managed-connection state machine and its
//!   supervisor task ([`ConnectionHandle`])
//! - Transport seam: [`Connector`] / [`ConnectionTx`] / [`ConnectionRx`]
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events. Library code emits events with
//! canonical names and does not initialize a global subscriber; binaries
//! and tests are responsible for one-time `tracing_subscriber`
//! initialization at process boundaries.

mod client;
mod config;
mod connection;
mod dispatch;
mod handler;
mod message;
mod transport;

#[doc(hidden)]
pub mod observability;

pub use client::MuxClient;
pub use config::{
    ConnectHook, ConnectionOptions, ErrorHook, ShutdownHook, StartupHook, DEFAULT_OUTGOING_LIMIT,
    DEFAULT_RECONNECT_TIMEOUT,
};
pub use connection::supervisor::ConnectionHandle;
pub use dispatch::channel_source::{ChannelSource, SendError};
pub use handler::{IncomingHandler, OutgoingHandler, ReplyHandler};
pub use message::{ChannelId, ConnectionId, Message};
pub use transport::{ConnectionRx, ConnectionTx, Connector, TransportError};
