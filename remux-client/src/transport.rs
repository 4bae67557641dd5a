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

//! The transport collaborator contract.
//!
//! The core owns no sockets. It asks a [`Connector`] for duplex byte-stream
//! halves and drives them; everything below that line — framing, TLS,
//! address selection — belongs to the transport implementation.

use crate::message::Message;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Transport failures. All of them are non-fatal to the core: every variant
/// funnels into the reconnect path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    /// A connect attempt was refused or timed out.
    Connect(String),
    /// An established connection failed while reading or writing.
    Io(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connect(reason) => write!(f, "connect failed: {reason}"),
            TransportError::Io(reason) => write!(f, "transport i/o failed: {reason}"),
        }
    }
}

impl Error for TransportError {}

/// Factory for physical connections.
///
/// Called once per connect attempt; a successful call yields the split
/// halves of one established duplex stream.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError>;
}

/// Write half of one established connection.
#[async_trait]
pub trait ConnectionTx: Send {
    async fn send(&mut self, message: Message) -> Result<(), TransportError>;
}

/// Read half of one established connection.
///
/// `Ok(None)` is the orderly-shutdown notification: the peer closed the
/// stream cleanly. It is not an error, but it schedules a reconnect exactly
/// like one.
#[async_trait]
pub trait ConnectionRx: Send {
    async fn recv(&mut self) -> Result<Option<Message>, TransportError>;
}
