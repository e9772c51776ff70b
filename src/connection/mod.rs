//! Stream connection to the monitoring service.
//!
//! [`StreamConnection`] owns the transport link. Each successful
//! [`open`](StreamConnection::open) yields a fresh [`EventStream`] that ends
//! when the link goes away; a new connection yields a new stream. Connection
//! state and transport errors are published through a `watch` channel that
//! any number of observers can follow.
//!
//! ```text
//!  Disconnected ──open()──▶ Connecting ──handshake ok──▶ Connected
//!       ▲                        │                           │
//!       └────handshake failed────┘     close / EOF / error ──┘
//! ```

mod backoff;
pub mod codec;
mod connector;
mod supervisor;

pub use backoff::Backoff;
pub use connector::{AsyncStream, BoxedStream, Connector, MemoryConnector, TcpConnector};
pub use supervisor::Supervisor;

use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vitalwatch_types::{InboundEvent, OutboundCommand};

use crate::error::{MonitorError, Result};

/// Buffered inbound events per connection before the reader waits on the consumer.
const EVENT_BUFFER: usize = 256;

/// Transport lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

/// What connection observers see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Most recent transport or command error, cleared on a successful open.
    pub last_error: Option<MonitorError>,
    /// Lines that could not be decoded, across all connections.
    pub malformed_frames: u64,
    /// Incremented on every open attempt.
    pub generation: u64,
}

/// Something that can carry commands to the monitoring service.
///
/// Implemented by [`ConnectionHandle`]; tests substitute a recorder.
pub trait CommandSink: Send + Sync + Debug {
    /// Current transport state.
    fn connection_state(&self) -> ConnectionState;

    /// Queue a command without waiting.
    ///
    /// Fails with [`MonitorError::NotConnected`] unless the link is
    /// `Connected`. Failures are also reported to connection observers.
    fn send(&self, command: OutboundCommand) -> Result<()>;

    /// Most recent transport or send failure, if any.
    fn last_error(&self) -> Option<MonitorError> {
        None
    }
}

struct Outbound {
    generation: u64,
    sender: mpsc::Sender<OutboundCommand>,
}

/// A cloneable handle for sending commands and observing connection state.
///
/// Handles stay valid across reconnects of the owning [`StreamConnection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    status: Arc<watch::Sender<ConnectionStatus>>,
    outbound: Arc<Mutex<Option<Outbound>>>,
}

impl ConnectionHandle {
    fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            status: Arc::new(status),
            outbound: Arc::new(Mutex::new(None)),
        }
    }

    /// Current transport state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// A copy of the full connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn try_send(&self, command: OutboundCommand) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(MonitorError::NotConnected);
        }
        let outbound = self.outbound.lock();
        let Some(outbound) = outbound.as_ref() else {
            return Err(MonitorError::NotConnected);
        };
        outbound.sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                MonitorError::Transport("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => MonitorError::NotConnected,
        })
    }

    /// Record a rejected command unless a transport failure is already the
    /// reported cause.
    fn report_rejection(&self, error: MonitorError) {
        self.status.send_if_modified(|s| {
            if s.last_error.as_ref().is_some_and(MonitorError::is_transport) {
                return false;
            }
            s.last_error = Some(error);
            true
        });
    }

    fn set_state(&self, state: ConnectionState, error: Option<MonitorError>) {
        self.status.send_modify(|s| {
            s.state = state;
            s.last_error = error;
        });
    }

    /// Move to `Disconnected` if `generation` is still the live connection.
    ///
    /// Returns false when a newer connection has taken over or the link is
    /// already down.
    fn mark_disconnected(&self, generation: u64, error: Option<MonitorError>) -> bool {
        let changed = self.status.send_if_modified(|s| {
            if s.generation != generation || s.state == ConnectionState::Disconnected {
                return false;
            }
            s.state = ConnectionState::Disconnected;
            if error.is_some() {
                s.last_error = error;
            }
            true
        });
        if changed {
            let mut outbound = self.outbound.lock();
            if outbound.as_ref().is_some_and(|o| o.generation == generation) {
                *outbound = None;
            }
        }
        changed
    }

    fn record_malformed(&self) {
        self.status.send_modify(|s| s.malformed_frames += 1);
    }
}

impl CommandSink for ConnectionHandle {
    fn connection_state(&self) -> ConnectionState {
        self.state()
    }

    fn send(&self, command: OutboundCommand) -> Result<()> {
        let name = command.name();
        let result = self.try_send(command);
        match &result {
            Ok(()) => debug!(command = name, "queued command"),
            Err(err) => {
                debug!(command = name, error = %err, "command rejected");
                self.report_rejection(err.clone());
            }
        }
        result
    }

    fn last_error(&self) -> Option<MonitorError> {
        self.status.borrow().last_error.clone()
    }
}

impl Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").field("status", &*self.status.borrow()).finish()
    }
}

/// The inbound event sequence for one connection.
///
/// Yields events in arrival order and ends when the connection closes. It
/// cannot be restarted; reopen the connection to get a new one.
///
/// After [`StreamConnection::close`] nothing more is yielded, including
/// events that were already buffered. When the peer hangs up, events read
/// before the hang-up are still delivered.
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::Receiver<InboundEvent>,
    closed: Arc<AtomicBool>,
}

impl EventStream {
    /// Wait for the next event. Returns `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        futures_util::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<InboundEvent>> {
        if self.closed.load(Ordering::Acquire) {
            self.receiver.close();
            return Poll::Ready(None);
        }
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(_)) if self.closed.load(Ordering::Acquire) => {
                self.receiver.close();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Stream for EventStream {
    type Item = InboundEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_event(cx)
    }
}

/// An explicitly owned link to the monitoring service.
///
/// Dropping the connection tears down its background tasks.
///
/// # Example
///
/// ```
/// use vitalwatch::connection::{CommandSink, ConnectionState, MemoryConnector, StreamConnection};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let connector = Arc::new(MemoryConnector::new());
/// let _server = connector.push();
///
/// let mut connection = StreamConnection::new(connector, Duration::from_secs(1));
/// let _events = connection.open().await.unwrap();
/// assert_eq!(connection.handle().connection_state(), ConnectionState::Connected);
///
/// connection.close();
/// assert_eq!(connection.state(), ConnectionState::Disconnected);
/// # });
/// ```
pub struct StreamConnection {
    connector: Arc<dyn Connector>,
    handshake_timeout: Duration,
    outbound_capacity: usize,
    handle: ConnectionHandle,
    tasks: Vec<JoinHandle<()>>,
    /// Closed flag shared with the current `EventStream`.
    closed: Option<Arc<AtomicBool>>,
}

impl StreamConnection {
    /// Default number of queued outbound commands.
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

    /// Create a disconnected connection.
    pub fn new(connector: Arc<dyn Connector>, handshake_timeout: Duration) -> Self {
        Self {
            connector,
            handshake_timeout,
            outbound_capacity: Self::DEFAULT_OUTBOUND_CAPACITY,
            handle: ConnectionHandle::new(),
            tasks: Vec::new(),
            closed: None,
        }
    }

    /// Set how many commands may be queued before `send` reports back-pressure.
    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Returns a human-readable description of the endpoint.
    pub fn description(&self) -> &str {
        self.connector.description()
    }

    /// A handle for sending commands and observing state.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Current transport state.
    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.handle.subscribe()
    }

    /// Queue a command. See [`CommandSink::send`].
    pub fn send(&self, command: OutboundCommand) -> Result<()> {
        self.handle.send(command)
    }

    /// Open the link and return its inbound event sequence.
    ///
    /// Any previous link is closed first. The handshake is bounded by the
    /// configured timeout; on failure the state returns to `Disconnected` and
    /// the error is both returned and published to observers.
    pub async fn open(&mut self) -> Result<EventStream> {
        self.close();

        let mut generation = 0;
        self.handle.status.send_modify(|s| {
            s.generation += 1;
            s.state = ConnectionState::Connecting;
            generation = s.generation;
        });
        info!(endpoint = self.description(), "connecting");

        let stream =
            match tokio::time::timeout(self.handshake_timeout, self.connector.connect()).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(self.fail_handshake(MonitorError::from(e))),
                Err(_) => {
                    return Err(self.fail_handshake(MonitorError::HandshakeTimeout(
                        self.handshake_timeout,
                    )))
                }
            };

        let (reader, writer) = tokio::io::split(stream);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (command_tx, command_rx) = mpsc::channel(self.outbound_capacity);

        *self.handle.outbound.lock() = Some(Outbound {
            generation,
            sender: command_tx,
        });
        self.handle.set_state(ConnectionState::Connected, None);
        info!(endpoint = self.description(), "connected");

        self.tasks.push(tokio::spawn(read_loop(
            reader,
            event_tx,
            self.handle.clone(),
            generation,
        )));
        self.tasks.push(tokio::spawn(write_loop(
            writer,
            command_rx,
            self.handle.clone(),
            generation,
        )));

        let closed = Arc::new(AtomicBool::new(false));
        self.closed = Some(closed.clone());

        Ok(EventStream {
            receiver: event_rx,
            closed,
        })
    }

    /// Tear down the link.
    ///
    /// The current event stream ends without yielding further events, even
    /// ones already buffered, and queued commands that were not yet written
    /// are dropped.
    pub fn close(&mut self) {
        if let Some(closed) = self.closed.take() {
            closed.store(true, Ordering::Release);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        *self.handle.outbound.lock() = None;
        if self.handle.state() != ConnectionState::Disconnected {
            self.handle.set_state(ConnectionState::Disconnected, None);
            info!(endpoint = self.description(), "connection closed");
        }
    }

    fn fail_handshake(&self, error: MonitorError) -> MonitorError {
        warn!(endpoint = self.description(), error = %error, "handshake failed");
        self.handle.set_state(ConnectionState::Disconnected, Some(error.clone()));
        error
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if let Some(closed) = self.closed.take() {
            closed.store(true, Ordering::Release);
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Debug for StreamConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("endpoint", &self.description())
            .field("state", &self.state())
            .finish()
    }
}

async fn read_loop<R>(
    reader: R,
    events: mpsc::Sender<InboundEvent>,
    handle: ConnectionHandle,
    generation: u64,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let error = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break Some(MonitorError::Transport("connection closed by peer".to_string())),
            Ok(_) => {
                if line.trim().is_empty() {
                    continue;
                }
                match codec::decode(&line) {
                    Ok(Some(event)) => {
                        if events.send(event).await.is_err() {
                            // Consumer dropped the stream
                            break None;
                        }
                    }
                    Ok(None) => debug!(line = line.trim(), "ignoring unhandled event"),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed frame");
                        handle.record_malformed();
                    }
                }
            }
            Err(e) => break Some(MonitorError::from(e)),
        }
    };

    if handle.mark_disconnected(generation, error.clone()) {
        match error {
            Some(err) => warn!(error = %err, "connection lost"),
            None => info!("event stream dropped, disconnecting"),
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut commands: mpsc::Receiver<OutboundCommand>,
    handle: ConnectionHandle,
    generation: u64,
) where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(command) = commands.recv().await {
        let line = match codec::encode(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(command = command.name(), error = %e, "failed to encode command");
                continue;
            }
        };
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            let err = MonitorError::from(e);
            if handle.mark_disconnected(generation, Some(err.clone())) {
                warn!(error = %err, "write failed, connection lost");
            }
            break;
        }
    }
}
