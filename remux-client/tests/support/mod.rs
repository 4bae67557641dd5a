//! Shared transport doubles and recording handlers for integration
//! scenarios.

#![allow(dead_code)]

use async_trait::async_trait;
use remux_client::{
    ConnectionId, ConnectionRx, ConnectionTx, Connector, IncomingHandler, Message,
    OutgoingHandler, ReplyHandler, TransportError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Once};
use tokio::sync::{mpsc, watch};

static TRACING: Once = Once::new();

/// Installs a compact per-process test subscriber. The library itself never
/// initializes one.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Awaitable monotonic counter built on a watch channel.
pub struct Counter {
    tx: watch::Sender<usize>,
}

impl Counter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    pub fn get(&self) -> usize {
        *self.tx.borrow()
    }

    pub async fn wait_for(&self, count: usize) {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|current| *current >= count)
            .await
            .expect("counter sender lives as long as the test");
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// One scripted connect outcome.
pub enum ConnectOutcome {
    Accept,
    Fail(&'static str),
}

enum InboundFrame {
    Data(Message),
    Shutdown,
    Error(&'static str),
}

/// One accepted connection, observable and drivable from the test.
pub struct Session {
    sent: StdMutex<Vec<Message>>,
    sent_count: Counter,
    fail_writes: AtomicBool,
    inbound: mpsc::UnboundedSender<InboundFrame>,
}

impl Session {
    /// Delivers an inbound payload to the client.
    pub fn push_inbound(&self, message: Message) {
        let _ = self.inbound.send(InboundFrame::Data(message));
    }

    /// Closes the connection cleanly, as the peer would.
    pub fn shutdown(&self) {
        let _ = self.inbound.send(InboundFrame::Shutdown);
    }

    /// Surfaces a read failure on the connection.
    pub fn fail(&self, reason: &'static str) {
        let _ = self.inbound.send(InboundFrame::Error(reason));
    }

    /// Makes every subsequent write on this connection fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Messages the client has written so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().expect("lock sent").clone()
    }

    pub async fn wait_for_sent(&self, count: usize) {
        self.sent_count.wait_for(count).await;
    }
}

struct SessionTx {
    session: Arc<Session>,
}

#[async_trait]
impl ConnectionTx for SessionTx {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        if self.session.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Io("scripted write failure".to_string()));
        }
        self.session.sent.lock().expect("lock sent").push(message);
        self.session.sent_count.bump();
        Ok(())
    }
}

struct SessionRx {
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait]
impl ConnectionRx for SessionRx {
    async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        match self.inbound.recv().await {
            Some(InboundFrame::Data(message)) => Ok(Some(message)),
            Some(InboundFrame::Error(reason)) => Err(TransportError::Io(reason.to_string())),
            Some(InboundFrame::Shutdown) | None => Ok(None),
        }
    }
}

/// Connector whose attempts follow a script of outcomes; once the script is
/// exhausted every further attempt is accepted.
pub struct ScriptedConnector {
    outcomes: StdMutex<VecDeque<ConnectOutcome>>,
    attempts: AtomicUsize,
    sessions: StdMutex<Vec<Arc<Session>>>,
    session_count: Counter,
}

impl ScriptedConnector {
    pub fn new(outcomes: impl IntoIterator<Item = ConnectOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: StdMutex::new(outcomes.into_iter().collect()),
            attempts: AtomicUsize::new(0),
            sessions: StdMutex::new(Vec::new()),
            session_count: Counter::new(),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::new([])
    }

    /// Total connect attempts, including refused ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.session_count.get()
    }

    pub fn session(&self, index: usize) -> Arc<Session> {
        self.sessions.lock().expect("lock sessions")[index].clone()
    }

    pub async fn wait_for_sessions(&self, count: usize) {
        self.session_count.wait_for(count).await;
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(
        &self,
    ) -> Result<(Box<dyn ConnectionTx>, Box<dyn ConnectionRx>), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .expect("lock outcomes")
            .pop_front()
            .unwrap_or(ConnectOutcome::Accept);

        match outcome {
            ConnectOutcome::Fail(reason) => Err(TransportError::Connect(reason.to_string())),
            ConnectOutcome::Accept => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let session = Arc::new(Session {
                    sent: StdMutex::new(Vec::new()),
                    sent_count: Counter::new(),
                    fail_writes: AtomicBool::new(false),
                    inbound: inbound_tx,
                });
                self.sessions
                    .lock()
                    .expect("lock sessions")
                    .push(session.clone());
                self.session_count.bump();
                Ok((
                    Box::new(SessionTx { session }),
                    Box::new(SessionRx {
                        inbound: inbound_rx,
                    }),
                ))
            }
        }
    }
}

/// Discards every inbound delivery.
pub struct NoopIncoming;

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

/// Records every inbound delivery together with its reply capability.
pub struct RecordingIncoming {
    received: StdMutex<Vec<(Message, ConnectionId)>>,
    replies: StdMutex<Vec<Arc<dyn OutgoingHandler>>>,
    count: Counter,
}

impl RecordingIncoming {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            received: StdMutex::new(Vec::new()),
            replies: StdMutex::new(Vec::new()),
            count: Counter::new(),
        })
    }

    pub fn received(&self) -> Vec<(Message, ConnectionId)> {
        self.received.lock().expect("lock received").clone()
    }

    pub fn reply(&self, index: usize) -> Arc<dyn OutgoingHandler> {
        self.replies.lock().expect("lock replies")[index].clone()
    }

    pub async fn wait_for(&self, count: usize) {
        self.count.wait_for(count).await;
    }
}

#[async_trait]
impl IncomingHandler for RecordingIncoming {
    async fn on_receive(
        &self,
        message: Message,
        origin: ConnectionId,
        reply: Arc<dyn OutgoingHandler>,
    ) {
        self.received
            .lock()
            .expect("lock received")
            .push((message, origin));
        self.replies.lock().expect("lock replies").push(reply);
        self.count.bump();
    }
}

/// Records every handled outgoing message.
pub struct RecordingOutgoing {
    handled: StdMutex<Vec<Message>>,
    count: Counter,
}

impl RecordingOutgoing {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handled: StdMutex::new(Vec::new()),
            count: Counter::new(),
        })
    }

    pub fn handled(&self) -> Vec<Message> {
        self.handled.lock().expect("lock handled").clone()
    }

    pub async fn wait_for(&self, count: usize) {
        self.count.wait_for(count).await;
    }
}

#[async_trait]
impl OutgoingHandler for RecordingOutgoing {
    async fn handle(&self, message: Message) {
        self.handled.lock().expect("lock handled").push(message);
        self.count.bump();
    }
}

/// Records every reply, present or dropped.
pub struct RecordingReply {
    replies: StdMutex<Vec<Option<Message>>>,
    count: Counter,
}

impl RecordingReply {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: StdMutex::new(Vec::new()),
            count: Counter::new(),
        })
    }

    pub fn replies(&self) -> Vec<Option<Message>> {
        self.replies.lock().expect("lock replies").clone()
    }

    pub async fn wait_for(&self, count: usize) {
        self.count.wait_for(count).await;
    }
}

#[async_trait]
impl ReplyHandler for RecordingReply {
    async fn on_reply(&self, reply: Option<Message>) {
        self.replies.lock().expect("lock replies").push(reply);
        self.count.bump();
    }
}
