// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection lifecycle for the gesture backend.
//!
//! [`GestureLink`] owns at most one connection at a time and moves through
//! an explicit state machine:
//!
//! ```text
//! Idle -> Connecting -> Open -> Closing -> Idle
//!            |            |
//!            +-> Idle     +-> Idle   (connect failure / peer close / fault)
//! ```
//!
//! Every path back to `Idle` goes through a single release step that is
//! tagged with the connection's generation, so a receive loop that outlives
//! its connection can never tear down a newer one.
//!
//! On a user-initiated disconnect the receive loop stops delivering messages,
//! sends the close frame and keeps reading until the peer's close reply
//! arrives or the stream ends. [`LinkConfig::close_timeout`] bounds that
//! whole exchange.
//!
//! Nothing here returns an error to the caller. Outcomes are published as
//! [`LinkStatus`] updates; complete messages are published as strings.

mod assembler;

pub use assembler::{Assembled, MessageAssembler};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{Connector, FrameKind, FrameSink, FrameSource, LinkError, WsConnector};

/// Reason sent with the close frame on a user-initiated disconnect.
pub const CLOSE_REASON: &str = "Closed by user";

/// Configuration for a [`GestureLink`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Broadcast channel capacity for message and status events.
    pub event_capacity: usize,
    /// Upper bound on the close handshake, from sending our close frame to
    /// receiving the peer's reply. `None` waits indefinitely.
    pub close_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            close_timeout: None,
        }
    }
}

/// Connection status as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
    /// Connect attempt failed.
    Error(String),
    /// Transport fault while receiving.
    ReceiveError(String),
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting..."),
            Self::Connected => f.write_str("Connected"),
            Self::Disconnected => f.write_str("Disconnected"),
            Self::Error(detail) => write!(f, "Error: {detail}"),
            Self::ReceiveError(detail) => write!(f, "Receive error: {detail}"),
        }
    }
}

struct OpenLink<S> {
    generation: u64,
    cancel: CancellationToken,
    sink: Arc<AsyncMutex<S>>,
    task: JoinHandle<()>,
}

enum LinkState<S> {
    Idle,
    Connecting {
        generation: u64,
        cancel: CancellationToken,
    },
    Open(OpenLink<S>),
    Closing {
        generation: u64,
    },
}

impl<S> LinkState<S> {
    fn generation(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Connecting { generation, .. } | Self::Closing { generation } => Some(*generation),
            Self::Open(link) => Some(link.generation),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting { .. } => "connecting",
            Self::Open(_) => "open",
            Self::Closing { .. } => "closing",
        }
    }
}

struct Shared<C: Connector> {
    connector: C,
    config: LinkConfig,
    state: Mutex<LinkState<C::Sink>>,
    next_generation: AtomicU64,
    status: Mutex<LinkStatus>,
    message_tx: broadcast::Sender<String>,
    status_tx: broadcast::Sender<LinkStatus>,
}

impl<C: Connector> Shared<C> {
    fn lock_state(&self) -> MutexGuard<'_, LinkState<C::Sink>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_status(&self, status: LinkStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status.clone();
        // No subscribers is fine.
        let _ = self.status_tx.send(status);
    }

    fn publish_message(&self, message: String) {
        let _ = self.message_tx.send(message);
    }

    /// Move `Idle -> Connecting`. Returns `None` if a connection is already
    /// active.
    fn begin_connect(&self) -> Option<(u64, CancellationToken)> {
        let mut state = self.lock_state();
        if !matches!(*state, LinkState::Idle) {
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *state = LinkState::Connecting {
            generation,
            cancel: cancel.clone(),
        };
        self.publish_status(LinkStatus::Connecting);
        Some((generation, cancel))
    }

    /// Return to `Idle` and publish `status`, but only if `generation` still
    /// owns the state. Both happen under the state lock so status order
    /// always matches transition order.
    fn release(&self, generation: u64, status: Option<LinkStatus>) {
        let mut state = self.lock_state();
        if state.generation() != Some(generation) {
            return;
        }
        *state = LinkState::Idle;
        if let Some(status) = status {
            self.publish_status(status);
        }
    }
}

/// Client for the gesture-classification backend.
///
/// Cloning is cheap and every clone drives the same connection, so a UI can
/// hand copies to spawned tasks.
pub struct GestureLink<C: Connector = WsConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for GestureLink<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for GestureLink<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureLink")
            .field("state", &self.shared.lock_state().name())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Default for GestureLink<WsConnector> {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl GestureLink<WsConnector> {
    /// Create a WebSocket-backed client.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector> GestureLink<C> {
    /// Create a client over a custom transport.
    #[must_use]
    pub fn with_connector(connector: C, config: LinkConfig) -> Self {
        let (message_tx, _) = broadcast::channel(config.event_capacity);
        let (status_tx, _) = broadcast::channel(config.event_capacity);

        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                state: Mutex::new(LinkState::Idle),
                next_generation: AtomicU64::new(0),
                status: Mutex::new(LinkStatus::Disconnected),
                message_tx,
                status_tx,
            }),
        }
    }

    /// Subscribe to complete incoming messages.
    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.shared.message_tx.subscribe()
    }

    /// Subscribe to connection status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<LinkStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Most recently published status.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(*self.shared.lock_state(), LinkState::Open(_))
    }

    /// Open a connection to `endpoint` and start receiving.
    ///
    /// Does nothing if a connection is already open or being opened. Failures
    /// are published as `Error: <detail>`; there is no retry.
    pub async fn connect(&self, endpoint: &str) {
        let Some((generation, cancel)) = self.shared.begin_connect() else {
            debug!("Ignoring connect to {endpoint}: link already active");
            return;
        };

        info!("Connecting to {endpoint}...");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.shared.connector.connect(endpoint) => Some(result),
        };

        match result {
            Some(Ok((sink, source))) => {
                if !self.open(generation, &cancel, sink, source) {
                    info!("Connect to {endpoint} abandoned");
                    self.shared.release(generation, Some(LinkStatus::Disconnected));
                    return;
                }
                info!("Connected to {endpoint}");
            }
            Some(Err(e)) => {
                error!("Connection to {endpoint} failed: {e}");
                self.shared
                    .release(generation, Some(LinkStatus::Error(e.to_string())));
            }
            None => {
                info!("Connect to {endpoint} cancelled");
                self.shared.release(generation, Some(LinkStatus::Disconnected));
            }
        }
    }

    /// Move `Connecting -> Open` and spawn the receive loop. Returns `false`
    /// if the attempt was cancelled while the transport was opening.
    fn open(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        sink: C::Sink,
        source: C::Source,
    ) -> bool {
        let mut state = self.shared.lock_state();
        let still_connecting = matches!(
            *state,
            LinkState::Connecting { generation: g, .. } if g == generation
        );
        if !still_connecting || cancel.is_cancelled() {
            return false;
        }

        self.shared.publish_status(LinkStatus::Connected);

        let sink = Arc::new(AsyncMutex::new(sink));
        let task = tokio::spawn(receive_loop(
            Arc::clone(&self.shared),
            source,
            Arc::clone(&sink),
            cancel.clone(),
            generation,
        ));

        *state = LinkState::Open(OpenLink {
            generation,
            cancel: cancel.clone(),
            sink,
            task,
        });
        true
    }

    /// Close the connection.
    ///
    /// Raises cancellation; the receive loop then sends a close frame with
    /// [`CLOSE_REASON`] and waits for the peer's reply. Returns once the loop
    /// has finished. A failed close handshake is logged and otherwise
    /// ignored; the link is released either way.
    ///
    /// Calling this while a connect is in flight abandons the attempt and
    /// returns the link to idle immediately, so a following `connect` is
    /// honoured. Does nothing when idle.
    pub async fn disconnect(&self) {
        let link = {
            let mut state = self.shared.lock_state();
            match std::mem::replace(&mut *state, LinkState::Idle) {
                LinkState::Open(link) => {
                    *state = LinkState::Closing {
                        generation: link.generation,
                    };
                    link
                }
                LinkState::Connecting { cancel, .. } => {
                    cancel.cancel();
                    info!("Connect abandoned");
                    self.shared.publish_status(LinkStatus::Disconnected);
                    return;
                }
                other => {
                    debug!("Ignoring disconnect: link is {}", other.name());
                    *state = other;
                    return;
                }
            }
        };

        info!("Disconnecting...");
        let OpenLink {
            generation,
            cancel,
            task,
            ..
        } = link;

        cancel.cancel();

        if let Err(e) = task.await {
            warn!("Receive loop ended abnormally: {e}");
        }

        // No-op unless the loop died before releasing.
        self.shared.release(generation, Some(LinkStatus::Disconnected));
    }

    /// Send `payload` as one text message.
    ///
    /// Silently does nothing unless the connection is open.
    pub async fn send(&self, payload: impl Into<String>) {
        let sink = {
            let state = self.shared.lock_state();
            match &*state {
                LinkState::Open(link) => Arc::clone(&link.sink),
                other => {
                    debug!("Dropping outgoing message: link is {}", other.name());
                    return;
                }
            }
        };

        let payload = payload.into();
        let mut sink = sink.lock().await;
        if let Err(e) = sink.send_text(payload).await {
            warn!("Send failed: {e}");
        }
    }
}

enum LoopExit {
    Cancelled,
    ClosedByPeer,
    StreamEnded,
}

async fn receive_loop<C: Connector>(
    shared: Arc<Shared<C>>,
    mut source: C::Source,
    sink: Arc<AsyncMutex<C::Sink>>,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut assembler = MessageAssembler::new();

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(LoopExit::Cancelled),
            next = source.next_frame() => next,
        };

        match next {
            Ok(Some(frame)) => match assembler.push(frame) {
                Assembled::Pending => {}
                Assembled::Message(message) => shared.publish_message(message),
                Assembled::Closed => break Ok(LoopExit::ClosedByPeer),
            },
            Ok(None) => break Ok(LoopExit::StreamEnded),
            Err(e) => break Err(e),
        }
    };

    match outcome {
        Ok(LoopExit::Cancelled) => {
            debug!("Receive loop cancelled, closing");
            close_handshake(shared.config.close_timeout, &sink, &mut source).await;
        }
        Ok(LoopExit::ClosedByPeer) => info!("Connection closed by peer"),
        Ok(LoopExit::StreamEnded) => info!("Connection stream ended"),
        Err(e) => {
            error!("Receive error: {e}");
            shared.publish_status(LinkStatus::ReceiveError(e.to_string()));
        }
    }

    shared.release(generation, Some(LinkStatus::Disconnected));
}

/// Run the close handshake within `limit`. Failures and timeouts are logged
/// and otherwise ignored.
async fn close_handshake<S: FrameSink, R: FrameSource>(
    limit: Option<Duration>,
    sink: &AsyncMutex<S>,
    source: &mut R,
) {
    let exchange = exchange_close(sink, source);
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .unwrap_or_else(|_| {
                Err(LinkError::Transport(format!(
                    "close handshake timed out after {limit:?}"
                )))
            }),
        None => exchange.await,
    };

    match result {
        Ok(()) => debug!("Close handshake complete"),
        Err(e) => debug!("Close handshake failed, continuing teardown: {e}"),
    }
}

/// Send our close frame, then discard incoming frames until the peer's close
/// reply or the end of the stream.
async fn exchange_close<S: FrameSink, R: FrameSource>(
    sink: &AsyncMutex<S>,
    source: &mut R,
) -> Result<(), LinkError> {
    sink.lock().await.close(CLOSE_REASON).await?;

    while let Some(frame) = source.next_frame().await? {
        if frame.kind == FrameKind::Close {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize};

    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::transport::Frame;

    const WAIT: Duration = Duration::from_secs(2);

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        Close(&'static str),
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum CloseBehavior {
        /// Close frame sent and the peer replies straight away.
        Succeed,
        /// Close frame sent; the test plays the peer's reply.
        Silent,
        Fail,
        Hang,
    }

    type FrameResult = Result<Option<Frame>, LinkError>;

    /// Test-side end of an in-memory connection.
    struct Peer {
        frames: mpsc::UnboundedSender<FrameResult>,
        sent: Arc<Mutex<Vec<Sent>>>,
    }

    impl Peer {
        fn push(&self, frame: Frame) {
            self.frames.send(Ok(Some(frame))).unwrap();
        }

        fn fail(&self, message: &str) {
            self.frames
                .send(Err(LinkError::Transport(message.to_string())))
                .unwrap();
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    struct MemorySource {
        frames: mpsc::UnboundedReceiver<FrameResult>,
    }

    impl FrameSource for MemorySource {
        async fn next_frame(&mut self) -> FrameResult {
            self.frames.recv().await.unwrap_or(Ok(None))
        }
    }

    struct MemorySink {
        sent: Arc<Mutex<Vec<Sent>>>,
        close: CloseBehavior,
        // Weak so dropping the Peer still ends the stream.
        reply: mpsc::WeakUnboundedSender<FrameResult>,
    }

    impl FrameSink for MemorySink {
        async fn send_text(&mut self, payload: String) -> Result<(), LinkError> {
            self.sent.lock().unwrap().push(Sent::Text(payload));
            Ok(())
        }

        async fn close(&mut self, reason: &'static str) -> Result<(), LinkError> {
            match self.close {
                CloseBehavior::Succeed => {
                    self.sent.lock().unwrap().push(Sent::Close(reason));
                    if let Some(frames) = self.reply.upgrade() {
                        let _ = frames.send(Ok(Some(Frame::close(reason))));
                    }
                    Ok(())
                }
                CloseBehavior::Silent => {
                    self.sent.lock().unwrap().push(Sent::Close(reason));
                    Ok(())
                }
                CloseBehavior::Fail => Err(LinkError::Transport("socket reset".to_string())),
                CloseBehavior::Hang => std::future::pending().await,
            }
        }
    }

    struct MemoryConnector {
        attempts: Arc<AtomicUsize>,
        refuse: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
        close: CloseBehavior,
        peers: mpsc::UnboundedSender<Peer>,
    }

    impl Connector for MemoryConnector {
        type Sink = MemorySink;
        type Source = MemorySource;

        async fn connect(&self, _endpoint: &str) -> Result<(MemorySink, MemorySource), LinkError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.hang.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.refuse.load(Ordering::SeqCst) {
                return Err(LinkError::Transport("connection refused".to_string()));
            }

            let (frames_tx, frames_rx) = mpsc::unbounded_channel();
            let sent = Arc::new(Mutex::new(Vec::new()));
            let reply = frames_tx.downgrade();
            let _ = self.peers.send(Peer {
                frames: frames_tx,
                sent: Arc::clone(&sent),
            });

            Ok((
                MemorySink {
                    sent,
                    close: self.close,
                    reply,
                },
                MemorySource { frames: frames_rx },
            ))
        }
    }

    struct Harness {
        link: GestureLink<MemoryConnector>,
        attempts: Arc<AtomicUsize>,
        refuse: Arc<AtomicBool>,
        hang: Arc<AtomicBool>,
        peers: mpsc::UnboundedReceiver<Peer>,
        statuses: broadcast::Receiver<LinkStatus>,
        messages: broadcast::Receiver<String>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(CloseBehavior::Succeed, LinkConfig::default())
        }

        fn with(close: CloseBehavior, config: LinkConfig) -> Self {
            let attempts = Arc::new(AtomicUsize::new(0));
            let refuse = Arc::new(AtomicBool::new(false));
            let hang = Arc::new(AtomicBool::new(false));
            let (peers_tx, peers) = mpsc::unbounded_channel();

            let link = GestureLink::with_connector(
                MemoryConnector {
                    attempts: Arc::clone(&attempts),
                    refuse: Arc::clone(&refuse),
                    hang: Arc::clone(&hang),
                    close,
                    peers: peers_tx,
                },
                config,
            );
            let statuses = link.subscribe_status();
            let messages = link.subscribe_messages();

            Self {
                link,
                attempts,
                refuse,
                hang,
                peers,
                statuses,
                messages,
            }
        }

        async fn next_status(&mut self) -> LinkStatus {
            timeout(WAIT, self.statuses.recv()).await.unwrap().unwrap()
        }

        async fn next_message(&mut self) -> String {
            timeout(WAIT, self.messages.recv()).await.unwrap().unwrap()
        }

        async fn next_peer(&mut self) -> Peer {
            timeout(WAIT, self.peers.recv()).await.unwrap().unwrap()
        }

        async fn open(&mut self) -> Peer {
            self.link.connect("ws://localhost:8765").await;
            assert_eq!(self.next_status().await, LinkStatus::Connecting);
            assert_eq!(self.next_status().await, LinkStatus::Connected);
            self.next_peer().await
        }
    }

    #[test]
    fn test_status_display() {
        assert_eq!(LinkStatus::Connecting.to_string(), "Connecting...");
        assert_eq!(LinkStatus::Connected.to_string(), "Connected");
        assert_eq!(LinkStatus::Disconnected.to_string(), "Disconnected");
        assert_eq!(
            LinkStatus::Error("connection refused".to_string()).to_string(),
            "Error: connection refused"
        );
        assert_eq!(
            LinkStatus::ReceiveError("reset".to_string()).to_string(),
            "Receive error: reset"
        );
    }

    #[tokio::test]
    async fn test_connect_publishes_connecting_then_connected() {
        let mut h = Harness::new();
        assert_eq!(h.link.status(), LinkStatus::Disconnected);

        let _peer = h.open().await;
        assert!(h.link.is_connected());
        assert_eq!(h.link.status(), LinkStatus::Connected);
    }

    #[tokio::test]
    async fn test_connect_while_connected_is_noop() {
        let mut h = Harness::new();
        let _peer = h.open().await;

        h.link.connect("ws://localhost:8765").await;

        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_connect_while_connecting_is_noop() {
        let mut h = Harness::new();
        h.hang.store(true, Ordering::SeqCst);

        let link = h.link.clone();
        let pending = tokio::spawn(async move { link.connect("ws://localhost:8765").await });
        assert_eq!(h.next_status().await, LinkStatus::Connecting);

        h.link.connect("ws://localhost:8765").await;
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));

        h.link.disconnect().await;
        timeout(WAIT, pending).await.unwrap().unwrap();
        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_right_after_abandoned_connect() {
        let mut h = Harness::new();
        h.hang.store(true, Ordering::SeqCst);

        let link = h.link.clone();
        let pending = tokio::spawn(async move { link.connect("ws://localhost:8765").await });
        assert_eq!(h.next_status().await, LinkStatus::Connecting);

        h.link.disconnect().await;
        assert_eq!(h.next_status().await, LinkStatus::Disconnected);

        h.hang.store(false, Ordering::SeqCst);
        let _peer = h.open().await;

        // The abandoned attempt winds down without touching the new link.
        timeout(WAIT, pending).await.unwrap().unwrap();
        assert!(h.link.is_connected());
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fragmented_message_is_published_once() {
        let mut h = Harness::new();
        let peer = h.open().await;

        peer.push(Frame::text_fragment(r#"{"gesture":"#, false));
        peer.push(Frame::text_fragment(r#""wave","confidence""#, false));
        peer.push(Frame::text_fragment(":0.92}", true));

        assert_eq!(
            h.next_message().await,
            r#"{"gesture":"wave","confidence":0.92}"#
        );

        peer.push(Frame::text("second"));
        assert_eq!(h.next_message().await, "second");
        assert!(matches!(h.messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_messages_keep_completion_order() {
        let mut h = Harness::new();
        let peer = h.open().await;

        for i in 0..10 {
            peer.push(Frame::text(format!("message {i}")));
        }
        for i in 0..10 {
            assert_eq!(h.next_message().await, format!("message {i}"));
        }
    }

    #[tokio::test]
    async fn test_peer_close_ends_loop_without_error() {
        let mut h = Harness::new();
        let peer = h.open().await;

        peer.push(Frame::text_fragment("never finished", false));
        peer.push(Frame::close("server shutting down"));

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(!h.link.is_connected());
        assert!(matches!(h.messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_stream_end_is_treated_as_peer_close() {
        let mut h = Harness::new();
        let peer = h.open().await;

        drop(peer);

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_transport_fault_publishes_receive_error() {
        let mut h = Harness::new();
        let peer = h.open().await;

        peer.fail("connection reset by peer");

        assert_eq!(
            h.next_status().await,
            LinkStatus::ReceiveError("connection reset by peer".to_string())
        );
        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_publishes_error_and_releases() {
        let mut h = Harness::new();
        h.refuse.store(true, Ordering::SeqCst);

        h.link.connect("ws://localhost:8765").await;
        assert_eq!(h.next_status().await, LinkStatus::Connecting);
        assert_eq!(
            h.next_status().await,
            LinkStatus::Error("connection refused".to_string())
        );
        assert!(!h.link.is_connected());

        h.refuse.store(false, Ordering::SeqCst);
        let _peer = h.open().await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let mut h = Harness::new();

        h.link.disconnect().await;

        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(h.link.status(), LinkStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_sends_close_and_allows_reconnect() {
        let mut h = Harness::new();
        let peer = h.open().await;

        h.link.disconnect().await;

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert_eq!(peer.sent(), vec![Sent::Close(CLOSE_REASON)]);
        assert!(!h.link.is_connected());

        let _second = h.open().await;
        assert!(h.link.is_connected());
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_close_reply() {
        let mut h = Harness::with(CloseBehavior::Silent, LinkConfig::default());
        let peer = h.open().await;

        let link = h.link.clone();
        let mut closing = tokio::spawn(async move { link.disconnect().await });

        timeout(WAIT, async {
            while peer.sent().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(peer.sent(), vec![Sent::Close(CLOSE_REASON)]);

        // Data after our close frame is dropped, not published.
        peer.push(Frame::text(r#"{"gesture":"late"}"#));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!closing.is_finished());
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));

        peer.push(Frame::close(""));
        timeout(WAIT, &mut closing).await.unwrap().unwrap();

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(matches!(h.messages.try_recv(), Err(TryRecvError::Empty)));
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_close_timeout_bounds_missing_reply() {
        let limit = Duration::from_millis(50);
        let config = LinkConfig {
            close_timeout: Some(limit),
            ..LinkConfig::default()
        };
        let mut h = Harness::with(CloseBehavior::Silent, config);
        let peer = h.open().await;

        let started = tokio::time::Instant::now();
        timeout(WAIT, h.link.disconnect()).await.unwrap();

        assert!(started.elapsed() >= limit);
        assert_eq!(peer.sent(), vec![Sent::Close(CLOSE_REASON)]);
        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_close_handshake_failure_is_ignored() {
        let mut h = Harness::with(CloseBehavior::Fail, LinkConfig::default());
        let _peer = h.open().await;

        h.link.disconnect().await;

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_close_timeout_bounds_stalled_handshake() {
        let config = LinkConfig {
            close_timeout: Some(Duration::from_millis(50)),
            ..LinkConfig::default()
        };
        let mut h = Harness::with(CloseBehavior::Hang, config);
        let _peer = h.open().await;

        timeout(WAIT, h.link.disconnect()).await.unwrap();

        assert_eq!(h.next_status().await, LinkStatus::Disconnected);
        assert!(!h.link.is_connected());
    }

    #[tokio::test]
    async fn test_send_writes_text_when_open() {
        let mut h = Harness::new();
        let peer = h.open().await;

        h.link.send(r#"{"command":"calibrate"}"#).await;

        assert_eq!(
            peer.sent(),
            vec![Sent::Text(r#"{"command":"calibrate"}"#.to_string())]
        );
    }

    #[tokio::test]
    async fn test_send_when_not_open_is_noop() {
        let mut h = Harness::new();

        h.link.send("ignored").await;

        assert_eq!(h.attempts.load(Ordering::SeqCst), 0);
        assert!(matches!(h.statuses.try_recv(), Err(TryRecvError::Empty)));
    }
}
