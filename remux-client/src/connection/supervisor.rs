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

//! Managed-connection driver: connect, reconnect with rate-limited spacing,
//! and teardown, on one dedicated task per physical connection.

use crate::config::ConnectionOptions;
use crate::connection::state::{transition, LinkEffect, LinkEvent, LinkState};
use crate::dispatch::channel_source::ChannelSource;
use crate::handler::{OutgoingHandler, ReplyHandler};
use crate::message::{ConnectionId, Message};
use crate::observability::events;
use crate::observability::fields::LinkContext;
use crate::transport::{ConnectionRx, ConnectionTx, Connector, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "connection_supervisor";

/// Rate-limited reconnect spacing: the remote endpoint sees at most one
/// connect attempt per `reconnect_timeout` window, while a window already
/// consumed by the previous attempt allows an immediate retry.
pub(crate) fn reconnect_wait(reconnect_timeout: Duration, elapsed: Duration) -> Duration {
    reconnect_timeout.saturating_sub(elapsed)
}

/// Send capability bound to one live physical connection. Pushing onto the
/// connection's outbound queue never blocks the dispatcher.
struct ConnectionSender {
    conn_id: ConnectionId,
    outbound: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl OutgoingHandler for ConnectionSender {
    async fn handle(&self, message: Message) {
        // The connection may have died between dispatch and delivery; the
        // supervisor is already scheduling a reconnect in that case.
        if self.outbound.send(message).is_err() {
            debug!(
                event = events::LINK_WRITE_FAILED,
                component = COMPONENT,
                conn_id = %self.conn_id,
                reason = "outbound queue closed",
                "discarding message for torn-down connection"
            );
        }
    }
}

/// Idempotent, level-triggered stop flag shared by handle and driver.
struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Returns `true` only for the call that performed the flip.
    fn stop(&self) -> bool {
        !self.tx.send_replace(true)
    }

    fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resources of one established connection.
struct LiveLink {
    conn_id: ConnectionId,
    rx: Box<dyn ConnectionRx>,
    outgoing: Arc<dyn OutgoingHandler>,
    writer: JoinHandle<()>,
    writer_failed: oneshot::Receiver<TransportError>,
}

/// What woke the connected-state loop.
enum Activity {
    Stop,
    WriterFailed(Option<TransportError>),
    Inbound(Result<Option<Message>, TransportError>),
}

/// Clonable control handle for one managed connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    source: Weak<ChannelSource>,
    stop: Arc<StopSignal>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConnectionHandle {
    /// Stops the connection: cancels any pending reconnect and tears the
    /// transport down. Idempotent; returns `true` for the call that
    /// actually stopped it.
    pub fn stop(&self) -> bool {
        self.stop.stop()
    }

    /// Sends through the bound channel source; a dropped message is
    /// signalled to `reply` as `None`.
    pub async fn send(&self, message: Message, reply: Option<Arc<dyn ReplyHandler>>) {
        let Some(source) = self.source.upgrade() else {
            if let Some(reply) = reply {
                reply.on_reply(None).await;
            }
            return;
        };
        if source.send(message).await.is_err() {
            if let Some(reply) = reply {
                reply.on_reply(None).await;
            }
        }
    }

    /// Waits for the driver task to finish. Intended for orderly teardown
    /// after [`stop`](Self::stop); returns immediately once joined.
    pub async fn stopped(&self) {
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Owns one physical connection's lifecycle on a dedicated task.
pub(crate) struct ConnectionSupervisor {
    context: LinkContext,
    connector: Arc<dyn Connector>,
    source: Weak<ChannelSource>,
    options: Arc<ConnectionOptions>,
    stop: Arc<StopSignal>,
}

impl ConnectionSupervisor {
    /// Starts the connection and returns its control handle. Must be called
    /// within a tokio runtime.
    pub(crate) fn spawn(
        connector: Arc<dyn Connector>,
        source: &Arc<ChannelSource>,
        options: Arc<ConnectionOptions>,
    ) -> ConnectionHandle {
        let link_id: Arc<str> = Uuid::new_v4().to_string().into();
        let stop = Arc::new(StopSignal::new());
        let supervisor = ConnectionSupervisor {
            context: LinkContext::new(link_id, source.channel_id().to_string()),
            connector,
            source: Arc::downgrade(source),
            options,
            stop: stop.clone(),
        };
        let task = tokio::spawn(supervisor.run());
        ConnectionHandle {
            source: Arc::downgrade(source),
            stop,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(self) {
        let mut stop_rx = self.stop.subscribe();
        let mut state = LinkState::Idle;
        let mut live: Option<LiveLink> = None;
        // The initial connect goes through the same timer edge as a retry,
        // with a zero wait.
        let mut wait = Duration::ZERO;
        let mut last_attempt = Instant::now();

        loop {
            let event = match state {
                LinkState::Idle | LinkState::ReconnectScheduled => {
                    self.await_timer(&mut stop_rx, wait).await
                }
                LinkState::Starting => {
                    self.attempt_connect(&mut stop_rx, &mut live, &mut last_attempt)
                        .await
                }
                LinkState::Connected => match live.as_mut() {
                    Some(link) => self.drive_connected(&mut stop_rx, link).await,
                    // No live link while connected: reschedule.
                    None => LinkEvent::Failed,
                },
                LinkState::Disconnecting => {
                    if self.stop.is_stopped() {
                        LinkEvent::StopRequested
                    } else {
                        // Clean shutdown funnels into the retry path.
                        LinkEvent::Failed
                    }
                }
                LinkState::Stopped => break,
            };

            let (next, effects) = transition(state, event);
            for effect in effects.iter().copied() {
                match effect {
                    LinkEffect::Register => self.register_live(live.as_mut()).await,
                    LinkEffect::Unregister => self.unregister_live(&mut live).await,
                    LinkEffect::ScheduleRetry => {
                        wait =
                            reconnect_wait(self.options.reconnect_timeout, last_attempt.elapsed());
                        debug!(
                            event = events::RECONNECT_SCHEDULED,
                            component = COMPONENT,
                            link_id = %self.context.link_id,
                            channel = %self.context.channel,
                            wait_ms = wait.as_millis() as u64,
                            "reconnect scheduled"
                        );
                    }
                    LinkEffect::Halt => {
                        if let Some(link) = live.take() {
                            link.writer.abort();
                        }
                        debug!(
                            event = events::LINK_STOPPED,
                            component = COMPONENT,
                            link_id = %self.context.link_id,
                            channel = %self.context.channel,
                            "connection stopped"
                        );
                    }
                }
            }
            state = next;
        }
    }

    async fn await_timer(&self, stop_rx: &mut watch::Receiver<bool>, wait: Duration) -> LinkEvent {
        tokio::select! {
            _ = stop_rx.wait_for(|stopped| *stopped) => LinkEvent::StopRequested,
            _ = tokio::time::sleep(wait) => {
                if self.stop.is_stopped() {
                    LinkEvent::StopRequested
                } else {
                    LinkEvent::TimerFired
                }
            }
        }
    }

    async fn attempt_connect(
        &self,
        stop_rx: &mut watch::Receiver<bool>,
        live: &mut Option<LiveLink>,
        last_attempt: &mut Instant,
    ) -> LinkEvent {
        // The rate limit spaces attempt starts, not failures.
        *last_attempt = Instant::now();
        debug!(
            event = events::CONNECT_ATTEMPT,
            component = COMPONENT,
            link_id = %self.context.link_id,
            channel = %self.context.channel,
            "attempting connect"
        );

        let outcome = tokio::select! {
            _ = stop_rx.wait_for(|stopped| *stopped) => return LinkEvent::StopRequested,
            outcome = self.connector.connect() => outcome,
        };
        if self.stop.is_stopped() {
            return LinkEvent::StopRequested;
        }

        match outcome {
            Ok((tx, rx)) => {
                let conn_id = ConnectionId::allocate();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let (failed_tx, failed_rx) = oneshot::channel();
                let writer = tokio::spawn(run_writer(tx, outbound_rx, failed_tx));
                *live = Some(LiveLink {
                    conn_id,
                    rx,
                    outgoing: Arc::new(ConnectionSender {
                        conn_id,
                        outbound: outbound_tx,
                    }),
                    writer,
                    writer_failed: failed_rx,
                });
                info!(
                    event = events::CONNECT_OK,
                    component = COMPONENT,
                    link_id = %self.context.link_id,
                    channel = %self.context.channel,
                    conn_id = %conn_id,
                    "connection established"
                );
                LinkEvent::Connected
            }
            Err(err) => {
                if let Some(hook) = &self.options.error_hook {
                    hook(&err);
                }
                warn!(
                    event = events::CONNECT_FAILED,
                    component = COMPONENT,
                    link_id = %self.context.link_id,
                    channel = %self.context.channel,
                    err = %err,
                    "connect attempt failed"
                );
                LinkEvent::Failed
            }
        }
    }

    async fn drive_connected(
        &self,
        stop_rx: &mut watch::Receiver<bool>,
        link: &mut LiveLink,
    ) -> LinkEvent {
        loop {
            let activity = tokio::select! {
                _ = stop_rx.wait_for(|stopped| *stopped) => Activity::Stop,
                failure = &mut link.writer_failed => Activity::WriterFailed(failure.ok()),
                inbound = link.rx.recv() => Activity::Inbound(inbound),
            };

            match activity {
                Activity::Stop => return LinkEvent::StopRequested,
                Activity::WriterFailed(err) => {
                    if let Some(err) = err {
                        if let Some(hook) = &self.options.error_hook {
                            hook(&err);
                        }
                        warn!(
                            event = events::LINK_WRITE_FAILED,
                            component = COMPONENT,
                            link_id = %self.context.link_id,
                            channel = %self.context.channel,
                            conn_id = %link.conn_id,
                            err = %err,
                            "write failed"
                        );
                    }
                    return LinkEvent::Failed;
                }
                Activity::Inbound(Ok(Some(message))) => {
                    self.deliver_inbound(link, message).await;
                }
                Activity::Inbound(Ok(None)) => {
                    info!(
                        event = events::LINK_SHUTDOWN,
                        component = COMPONENT,
                        link_id = %self.context.link_id,
                        channel = %self.context.channel,
                        conn_id = %link.conn_id,
                        "peer shut the connection down"
                    );
                    if let Some(hook) = &self.options.shutdown_hook {
                        hook(link.conn_id);
                    }
                    return LinkEvent::ShutdownRequested;
                }
                Activity::Inbound(Err(err)) => {
                    if let Some(hook) = &self.options.error_hook {
                        hook(&err);
                    }
                    warn!(
                        event = events::LINK_READ_FAILED,
                        component = COMPONENT,
                        link_id = %self.context.link_id,
                        channel = %self.context.channel,
                        conn_id = %link.conn_id,
                        err = %err,
                        "read failed"
                    );
                    return LinkEvent::Failed;
                }
            }
        }
    }

    async fn deliver_inbound(&self, link: &mut LiveLink, message: Message) {
        if let Some(custom) = &self.options.incoming_override {
            custom
                .on_receive(message, link.conn_id, link.outgoing.clone())
                .await;
            return;
        }
        let Some(source) = self.source.upgrade() else {
            debug!(
                event = events::SOURCE_RELEASED,
                component = COMPONENT,
                link_id = %self.context.link_id,
                channel = %self.context.channel,
                reason = "source dropped",
                "discarding inbound message"
            );
            return;
        };
        source
            .receive(message, link.conn_id, link.outgoing.clone())
            .await;
    }

    async fn register_live(&self, live: Option<&mut LiveLink>) {
        let Some(link) = live else { return };
        if let Some(hook) = &self.options.connect_hook {
            hook();
        }
        let Some(source) = self.source.upgrade() else {
            debug!(
                event = events::SOURCE_RELEASED,
                component = COMPONENT,
                link_id = %self.context.link_id,
                channel = %self.context.channel,
                reason = "source dropped before registration",
                "stopping connection"
            );
            self.stop.stop();
            return;
        };
        source.register(link.conn_id, link.outgoing.clone()).await;
        if let Some(hook) = &self.options.startup_hook {
            hook(link.conn_id, link.outgoing.clone());
        }
    }

    async fn unregister_live(&self, live: &mut Option<LiveLink>) {
        let Some(link) = live.take() else { return };
        if let Some(source) = self.source.upgrade() {
            source.unregister(link.conn_id).await;
        }
        link.writer.abort();
    }
}

/// Drains the outbound queue onto the connection's write half; the first
/// write failure is reported back to the driver and ends the task.
async fn run_writer(
    mut tx: Box<dyn ConnectionTx>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    failed: oneshot::Sender<TransportError>,
) {
    while let Some(message) = outbound.recv().await {
        if let Err(err) = tx.send(message).await {
            let _ = failed.send(err);
            return;
        }
    }
}
