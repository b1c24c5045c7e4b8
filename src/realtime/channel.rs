//! Auto-reconnecting WebSocket channel.
//!
//! # Responsibilities
//! - Own the socket, the reconnect timer and the reconnect counter
//! - Publish status and the latest message through `watch` channels
//! - Re-establish dropped connections up to `max_retries` times
//!
//! # Data Flow
//! ```text
//! RealtimeChannel (handle) ──Command──→ ChannelTask (spawned)
//!        ↑                                   │
//!        └──── watch: status / data ─────────┤
//!        └──── broadcast: ChannelEvent ──────┘
//! ```
//!
//! # Design Decisions
//! - Every transition happens inside the task, so a replaced socket can
//!   never publish state
//! - Only a close schedules a reconnection. A transport error sets `Error`
//!   and is always followed by a close.
//! - `close()` pins the counter at `max_retries`; `reconnect()` resets it
//! - Writes go through a bounded queue to a per-connection writer task, so
//!   a peer that stops reading never stalls command handling

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::ChannelConfig;
use crate::observability::metrics;
use crate::realtime::message::ChannelMessage;
use crate::realtime::options::ChannelOptions;
use crate::realtime::state::{ChannelEvent, ConnectionStatus};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Outbound frames queued per connection; further sends are dropped.
const OUTBOUND_CAPACITY: usize = 32;

/// Time a released connection gets to flush and send its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ConnectFuture = Pin<Box<dyn Future<Output = Result<Socket, WsError>> + Send>>;

/// Write half of a live connection, drained by its own task.
struct Writer {
    outbound: mpsc::Sender<Message>,
    task: JoinHandle<Result<(), WsError>>,
}

enum Command {
    Connect,
    Send(String),
    Close,
    Reconnect,
    Shutdown,
}

/// Handle to a realtime channel.
///
/// All methods return immediately; their effects are observed through
/// [`status`](Self::status), [`data`](Self::data) and
/// [`subscribe`](Self::subscribe). Dropping the handle cancels any pending
/// reconnection and closes the socket.
///
/// Must be created from within a tokio runtime.
pub struct RealtimeChannel {
    target: Option<String>,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    data: watch::Receiver<Option<ChannelMessage>>,
    events: broadcast::Sender<ChannelEvent>,
}

impl RealtimeChannel {
    /// Create an idle channel. Nothing happens until [`connect`](Self::connect).
    pub fn new(target: Option<String>, options: ChannelOptions) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);
        let (data_tx, data) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let task = ChannelTask {
            target: target.clone(),
            options,
            commands: command_rx,
            status: status_tx,
            data: data_tx,
            events: events.clone(),
            retries: 0,
            connecting: None,
            reader: None,
            writer: None,
            reconnect_timer: None,
        };
        tokio::spawn(task.run());

        Self {
            target,
            commands,
            status,
            data,
            events,
        }
    }

    /// Create a channel and start connecting right away.
    pub fn open(target: Option<String>, options: ChannelOptions) -> Self {
        let channel = Self::new(target, options);
        channel.connect();
        channel
    }

    /// Idle channel for the configured target.
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.target(), ChannelOptions::from_config(config))
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Start a connection attempt. Does nothing without a target, or while
    /// an attempt or live connection already exists.
    pub fn connect(&self) {
        self.dispatch(Command::Connect);
    }

    /// Transmit a text frame if the channel is connected; dropped otherwise.
    pub fn send(&self, message: impl Into<String>) {
        self.dispatch(Command::Send(message.into()));
    }

    /// Serialize `value` to JSON and [`send`](Self::send) it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> Result<(), serde_json::Error> {
        let text = serde_json::to_string(value)?;
        self.send(text);
        Ok(())
    }

    /// Cancel any pending reconnection and close the connection.
    ///
    /// Calling it again is a no-op.
    pub fn close(&self) {
        self.dispatch(Command::Close);
    }

    /// Reset the reconnect counter, drop the current connection and connect
    /// again.
    pub fn reconnect(&self) {
        self.dispatch(Command::Reconnect);
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Most recent message, if any has arrived.
    pub fn data(&self) -> Option<ChannelMessage> {
        self.data.borrow().clone()
    }

    pub fn watch_data(&self) -> watch::Receiver<Option<ChannelMessage>> {
        self.data.clone()
    }

    /// Receive every status change, message and scheduled reconnection from
    /// now on. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }

    fn dispatch(&self, command: Command) {
        // The task only exits after the handle is dropped or the runtime stops.
        let _ = self.commands.send(command);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.dispatch(Command::Shutdown);
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("target", &self.target)
            .field("status", &self.status())
            .finish()
    }
}

struct ChannelTask {
    target: Option<String>,
    options: ChannelOptions,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<ConnectionStatus>,
    data: watch::Sender<Option<ChannelMessage>>,
    events: broadcast::Sender<ChannelEvent>,
    retries: u32,
    connecting: Option<ConnectFuture>,
    reader: Option<SplitStream<Socket>>,
    writer: Option<Writer>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl ChannelTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.connect(),
                    Some(Command::Send(text)) => self.send(text),
                    Some(Command::Close) => self.close(),
                    Some(Command::Reconnect) => self.reconnect(),
                    Some(Command::Shutdown) | None => break,
                },
                result = pending_connect(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result);
                }
                frame = next_frame(&mut self.reader) => self.on_frame(frame),
                result = writer_finished(&mut self.writer) => {
                    self.writer = None;
                    self.on_writer_finished(result);
                }
                _ = timer_fired(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.connect();
                }
            }
        }

        self.reconnect_timer = None;
        self.connecting = None;
        self.release_socket();
        self.set_status(ConnectionStatus::Disconnected);
        tracing::debug!(url = ?self.target, "Channel task stopped");
    }

    fn connect(&mut self) {
        let Some(target) = self.target.clone() else {
            tracing::debug!("No channel target configured, ignoring connect");
            return;
        };
        if self.connecting.is_some() || self.reader.is_some() || self.writer.is_some() {
            tracing::debug!(url = %target, "Channel already connecting or connected");
            return;
        }

        self.reconnect_timer = None;
        self.set_status(ConnectionStatus::Connecting);
        tracing::info!(url = %target, retries = self.retries, "Connecting channel");

        let request = build_request(&target, &self.options.protocols);
        self.connecting = Some(Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(request?).await?;
            Ok::<_, WsError>(socket)
        }));
    }

    fn on_connect_result(&mut self, result: Result<Socket, WsError>) {
        match result {
            Ok(socket) => {
                let (sink, stream) = socket.split();
                let (outbound, queue) = mpsc::channel(OUTBOUND_CAPACITY);
                self.reader = Some(stream);
                self.writer = Some(Writer {
                    outbound,
                    task: tokio::spawn(write_frames(sink, queue)),
                });
                self.retries = 0;
                metrics::record_channel_connection(true);
                tracing::info!(url = ?self.target, "Channel connected");
                self.set_status(ConnectionStatus::Connected);
            }
            Err(e) => {
                metrics::record_channel_connection(false);
                tracing::warn!(url = ?self.target, error = %e, "Channel connection failed");
                self.set_status(ConnectionStatus::Error);
                self.on_closed();
            }
        }
    }

    fn on_frame(&mut self, frame: Option<Result<Message, WsError>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.on_message(ChannelMessage::from_text(text.as_str())),
            Some(Ok(Message::Binary(bytes))) => {
                self.on_message(ChannelMessage::from_text(&String::from_utf8_lossy(&bytes)))
            }
            Some(Ok(Message::Close(frame))) => {
                // The stream ends once the close reply is flushed.
                tracing::debug!(?frame, "Channel close frame received");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(url = ?self.target, error = %e, "Channel transport error");
                self.set_status(ConnectionStatus::Error);
                self.on_closed();
            }
            None => {
                tracing::info!(url = ?self.target, "Channel closed by peer");
                self.on_closed();
            }
        }
    }

    fn on_writer_finished(&mut self, result: Result<Result<(), WsError>, JoinError>) {
        match result {
            Ok(Err(e)) => {
                tracing::warn!(url = ?self.target, error = %e, "Channel send failed");
            }
            Ok(Ok(())) => tracing::debug!(url = ?self.target, "Channel writer stopped"),
            Err(e) => tracing::warn!(url = ?self.target, error = %e, "Channel writer task failed"),
        }
        self.set_status(ConnectionStatus::Error);
        self.on_closed();
    }

    fn on_message(&mut self, message: ChannelMessage) {
        metrics::record_channel_message(message.kind());
        self.data.send_replace(Some(message.clone()));
        self.emit(ChannelEvent::Message(message));
    }

    /// Close transition: clear the socket, then decide on reconnection.
    fn on_closed(&mut self) {
        self.release_socket();
        self.set_status(ConnectionStatus::Disconnected);

        if !self.options.reconnect || self.retries >= self.options.max_retries {
            tracing::debug!(
                retries = self.retries,
                max_retries = self.options.max_retries,
                "Channel staying disconnected"
            );
            return;
        }

        self.retries += 1;
        let delay = self.options.reconnect_interval;
        tracing::info!(
            attempt = self.retries,
            max_retries = self.options.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Scheduling channel reconnect"
        );
        metrics::record_channel_reconnect_scheduled();
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
        self.emit(ChannelEvent::ReconnectScheduled {
            attempt: self.retries,
            delay,
        });
    }

    fn send(&mut self, text: String) {
        if !self.status.borrow().is_connected() {
            tracing::debug!("Channel not connected, dropping outbound message");
            return;
        }
        let Some(writer) = self.writer.as_ref() else {
            return;
        };

        match writer.outbound.try_send(Message::Text(text.into())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    url = ?self.target,
                    capacity = OUTBOUND_CAPACITY,
                    "Channel outbound queue full, dropping message"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Channel writer gone, dropping outbound message");
            }
        }
    }

    fn close(&mut self) {
        self.reconnect_timer = None;
        self.retries = self.options.max_retries;
        self.connecting = None;
        self.release_socket();
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn reconnect(&mut self) {
        tracing::info!(url = ?self.target, "Manual channel reconnect");
        self.retries = 0;
        self.reconnect_timer = None;
        self.connecting = None;
        self.release_socket();
        self.connect();
    }

    /// Drop the live connection without running the reconnect evaluation.
    ///
    /// The writer flushes what is queued and sends a close frame; it is
    /// aborted if that takes longer than `CLOSE_TIMEOUT`.
    fn release_socket(&mut self) {
        self.reader = None;
        let Some(Writer { outbound, mut task }) = self.writer.take() else {
            return;
        };
        drop(outbound);

        tokio::spawn(async move {
            match tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await {
                Ok(Ok(Err(e))) => tracing::debug!(error = %e, "Channel close handshake failed"),
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!("Channel writer did not finish closing, aborting");
                    task.abort();
                }
            }
        });
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            tracing::debug!(status = %status, "Channel status changed");
            self.emit(ChannelEvent::Status(status));
        }
    }

    fn emit(&self, event: ChannelEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

fn build_request(target: &str, protocols: &[String]) -> Result<Request, WsError> {
    let mut request = target.into_client_request()?;
    if !protocols.is_empty() {
        let value = HeaderValue::from_str(&protocols.join(", "))
            .map_err(|e| WsError::HttpFormat(e.into()))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, value);
    }
    Ok(request)
}

async fn pending_connect(slot: &mut Option<ConnectFuture>) -> Result<Socket, WsError> {
    match slot.as_mut() {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(reader: &mut Option<SplitStream<Socket>>) -> Option<Result<Message, WsError>> {
    match reader.as_mut() {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

async fn writer_finished(writer: &mut Option<Writer>) -> Result<Result<(), WsError>, JoinError> {
    match writer.as_mut() {
        Some(writer) => (&mut writer.task).await,
        None => std::future::pending().await,
    }
}

/// Drain `queue` into the socket, then close it once the queue's sender is
/// dropped.
async fn write_frames(
    mut sink: SplitSink<Socket, Message>,
    mut queue: mpsc::Receiver<Message>,
) -> Result<(), WsError> {
    while let Some(message) = queue.recv().await {
        sink.send(message).await?;
    }
    sink.close().await
}

async fn timer_fired(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn collect_until_quiet(
        events: &mut broadcast::Receiver<ChannelEvent>,
        quiet: Duration,
    ) -> Vec<ChannelEvent> {
        let mut seen = Vec::new();
        while let Ok(Ok(event)) = tokio::time::timeout(quiet, events.recv()).await {
            seen.push(event);
        }
        seen
    }

    /// An address with nothing listening on it.
    async fn refused_target() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/ws")
    }

    fn scheduled(events: &[ChannelEvent]) -> Vec<u32> {
        events
            .iter()
            .filter_map(|event| match event {
                ChannelEvent::ReconnectScheduled { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect()
    }

    fn fast_options(max_retries: u32) -> ChannelOptions {
        ChannelOptions::default()
            .reconnect_interval(Duration::from_millis(20))
            .max_retries(max_retries)
    }

    #[tokio::test]
    async fn connect_without_target_is_a_no_op() {
        let channel = RealtimeChannel::new(None, ChannelOptions::default());
        let mut events = channel.subscribe();

        channel.connect();
        channel.send("ignored");

        let seen = collect_until_quiet(&mut events, Duration::from_millis(50)).await;
        assert!(seen.is_empty());
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
        assert!(channel.data().is_none());
    }

    #[tokio::test]
    async fn failing_target_exhausts_reconnect_budget() {
        let channel = RealtimeChannel::new(Some(refused_target().await), fast_options(2));
        let mut events = channel.subscribe();
        channel.connect();

        let seen = collect_until_quiet(&mut events, Duration::from_millis(300)).await;
        assert_eq!(scheduled(&seen), vec![1, 2]);

        let attempts = seen
            .iter()
            .filter(|e| **e == ChannelEvent::Status(ConnectionStatus::Connecting))
            .count();
        assert_eq!(attempts, 3);
        assert_eq!(seen.last(), Some(&ChannelEvent::Status(ConnectionStatus::Disconnected)));
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn failed_attempt_reports_error_before_disconnect() {
        let channel = RealtimeChannel::new(Some(refused_target().await), fast_options(0));
        let mut events = channel.subscribe();
        channel.connect();

        let seen = collect_until_quiet(&mut events, Duration::from_millis(200)).await;
        assert_eq!(
            seen,
            vec![
                ChannelEvent::Status(ConnectionStatus::Connecting),
                ChannelEvent::Status(ConnectionStatus::Error),
                ChannelEvent::Status(ConnectionStatus::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn close_cancels_pending_reconnect() {
        let options = ChannelOptions::default()
            .reconnect_interval(Duration::from_millis(200))
            .max_retries(5);
        let channel = RealtimeChannel::new(Some(refused_target().await), options);
        let mut events = channel.subscribe();
        channel.connect();

        loop {
            let event = events.recv().await.unwrap();
            if matches!(event, ChannelEvent::ReconnectScheduled { .. }) {
                break;
            }
        }
        channel.close();
        channel.close();

        let seen = collect_until_quiet(&mut events, Duration::from_millis(500)).await;
        assert!(!seen.contains(&ChannelEvent::Status(ConnectionStatus::Connecting)));
        assert!(scheduled(&seen).is_empty());
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn manual_reconnect_resets_counter() {
        let channel = RealtimeChannel::new(Some(refused_target().await), fast_options(1));
        let mut events = channel.subscribe();
        channel.connect();

        let first = collect_until_quiet(&mut events, Duration::from_millis(200)).await;
        assert_eq!(scheduled(&first), vec![1]);

        channel.reconnect();
        let second = collect_until_quiet(&mut events, Duration::from_millis(200)).await;
        assert_eq!(scheduled(&second), vec![1]);
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn reconnect_disabled_stays_disconnected() {
        let options = fast_options(5).reconnect(false);
        let channel = RealtimeChannel::open(Some(refused_target().await), options);
        let mut events = channel.subscribe();

        let seen = collect_until_quiet(&mut events, Duration::from_millis(200)).await;
        assert!(scheduled(&seen).is_empty());
        assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn protocols_are_offered_in_handshake() {
        let request = build_request(
            "ws://localhost:8000/ws",
            &["quotes.v1".to_string(), "quotes.v2".to_string()],
        )
        .unwrap();
        assert_eq!(
            request.headers().get("Sec-WebSocket-Protocol").unwrap(),
            "quotes.v1, quotes.v2"
        );
    }

    #[test]
    fn invalid_target_is_rejected() {
        assert!(build_request("not a url", &[]).is_err());
    }
}
