//! Connection manager for the realtime channel
//!
//! 1. Connect with the session credential
//! 2. On success: reset the attempt counter, re-join remembered rooms,
//!    flush queued emits, signal `Connected` (the engine reconciles)
//! 3. Forward domain frames to the engine, answer pings, heartbeat
//! 4. On loss: back off (floor..ceiling) and retry while the credential is
//!    valid; `RetryNow` cuts the wait short
//! 5. Auth rejection or expiry is terminal until a new credential arrives
//!
//! The manager never touches the stores.

pub mod state;
pub mod transport;

pub use state::{ConnectionSnapshot, ConnectionState, ConnectionStatus};
pub use transport::backoff_delay;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use shared::message::{ClientEmit, LifecycleSignal};
use shared::{EventFrame, Room};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::engine::EngineInput;
use crate::error::SyncResult;
use crate::session::Credential;
use transport::WsStream;

type WsSink = SplitSink<WsStream, Message>;

/// Requests from the engine to the manager
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionCommand {
    Connect(Credential),
    Disconnect,
    Subscribe(Room),
    Unsubscribe(Room),
    /// Skip the remaining backoff
    RetryNow,
}

/// Notifications from the manager to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSignal {
    Connected,
    Disconnected { will_retry: bool },
    AuthRejected { reason: String },
    CredentialExpired,
    Event(EventFrame),
}

/// Engine-side handle to the manager
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<ConnectionCommand>,
    snapshot: watch::Receiver<ConnectionSnapshot>,
}

impl ConnectionHandle {
    pub fn new(
        commands: mpsc::UnboundedSender<ConnectionCommand>,
        snapshot: watch::Receiver<ConnectionSnapshot>,
    ) -> Self {
        Self { commands, snapshot }
    }

    /// Handle with no manager behind it; commands land in the returned
    /// receiver
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ConnectionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_snapshot_tx, snapshot_rx) = watch::channel(ConnectionSnapshot::default());
        (Self::new(tx, snapshot_rx), rx)
    }

    fn send(&self, command: ConnectionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn connect(&self, credential: Credential) -> bool {
        self.send(ConnectionCommand::Connect(credential))
    }

    pub fn disconnect(&self) -> bool {
        self.send(ConnectionCommand::Disconnect)
    }

    pub fn subscribe(&self, room: Room) -> bool {
        self.send(ConnectionCommand::Subscribe(room))
    }

    pub fn unsubscribe(&self, room: Room) -> bool {
        self.send(ConnectionCommand::Unsubscribe(room))
    }

    pub fn retry_now(&self) -> bool {
        self.send(ConnectionCommand::RetryNow)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.snapshot.clone()
    }
}

/// Manager-side sender into the engine queue
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<EngineInput>,
}

impl SignalSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineInput>) -> Self {
        Self { tx }
    }

    pub fn send(&self, signal: ConnectionSignal) -> bool {
        self.tx.send(EngineInput::Connection(signal)).is_ok()
    }
}

/// How a connected session ended
#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    /// Disconnect requested
    Closed,
    /// New credential, reconnect right away
    Restart,
    /// Transport loss, retry with backoff
    Lost(String),
    /// Server refused the credential after upgrade
    Rejected(String),
}

pub struct ConnectionManager {
    url: String,
    reconnect_floor: Duration,
    reconnect_ceiling: Duration,
    heartbeat_interval: Option<Duration>,
    heartbeat_timeout: Duration,
    commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    snapshot_tx: watch::Sender<ConnectionSnapshot>,
    signals: SignalSender,
    state: ConnectionState,
    credential: Option<Credential>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        config: &SyncConfig,
        commands: mpsc::UnboundedReceiver<ConnectionCommand>,
        snapshot_tx: watch::Sender<ConnectionSnapshot>,
        signals: SignalSender,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            url: config.ws_url.clone(),
            reconnect_floor: config.reconnect_floor(),
            reconnect_ceiling: config.reconnect_ceiling(),
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            commands,
            snapshot_tx,
            signals,
            state: ConnectionState::default(),
            credential: None,
            shutdown,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.snapshot());
    }

    /// Main run loop: connect, run the session, back off, repeat
    pub async fn run(mut self) {
        tracing::info!(url = %self.url, "ConnectionManager started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let Some(credential) = self.credential.clone() else {
                // Idle until a credential arrives
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    cmd = self.commands.recv() => match cmd {
                        Some(cmd) => {
                            self.handle_offline_command(cmd);
                        }
                        None => break,
                    }
                }
                continue;
            };

            if credential.is_expired() {
                tracing::error!("Credential expired, giving up on the realtime channel");
                self.credential = None;
                self.state.on_failed("credential expired", false);
                self.publish();
                self.signals.send(ConnectionSignal::CredentialExpired);
                continue;
            }

            self.state.begin_attempt();
            self.publish();
            tracing::info!(
                attempt = self.state.reconnection_attempts(),
                status = %self.state.status(),
                "Connecting realtime channel"
            );

            let result = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = transport::connect(&self.url, &credential) => result,
            };

            match result {
                Ok(ws) => {
                    let emits = self.state.on_connected();
                    self.publish();
                    self.signals.send(ConnectionSignal::Connected);

                    match self.run_session(ws, emits).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed => {
                            self.close_session();
                            continue;
                        }
                        SessionEnd::Restart => {
                            tracing::info!("Credential replaced, reconnecting");
                            self.state.on_lost("credential replaced");
                            self.publish();
                            self.signals
                                .send(ConnectionSignal::Disconnected { will_retry: true });
                            continue;
                        }
                        SessionEnd::Rejected(reason) => {
                            self.reject(reason);
                            continue;
                        }
                        SessionEnd::Lost(reason) => {
                            tracing::warn!("Realtime channel lost: {reason}");
                            self.state.on_lost(reason);
                            self.publish();
                            self.signals
                                .send(ConnectionSignal::Disconnected { will_retry: true });
                        }
                    }
                }
                Err(e) if e.is_auth() => {
                    self.reject(e.to_string());
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = self.state.reconnection_attempts(),
                        "Realtime connect failed: {e}"
                    );
                    self.state.on_failed(e.to_string(), true);
                    self.publish();
                }
            }

            let delay = backoff_delay(
                self.state.reconnection_attempts(),
                self.reconnect_floor,
                self.reconnect_ceiling,
            );
            if !self.wait_backoff(delay).await {
                break;
            }
        }

        tracing::info!("ConnectionManager stopped");
    }

    /// Sleep for `delay` while still serving commands; `false` on shutdown
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_offline_command(cmd) {
                            return true;
                        }
                    }
                    None => return false,
                }
            }
        }
    }

    /// Apply a command while no channel is open; `true` ends any backoff
    fn handle_offline_command(&mut self, command: ConnectionCommand) -> bool {
        match command {
            ConnectionCommand::Connect(credential) => {
                self.credential = Some(credential);
                true
            }
            ConnectionCommand::Disconnect => {
                // Logout clears room memory even after a rejection or expiry
                self.close_session();
                true
            }
            ConnectionCommand::Subscribe(room) => {
                self.state.subscribe(room);
                self.publish();
                false
            }
            ConnectionCommand::Unsubscribe(room) => {
                self.state.unsubscribe(room);
                self.publish();
                false
            }
            ConnectionCommand::RetryNow => {
                tracing::info!("Connectivity regained, retrying now");
                self.credential.is_some()
            }
        }
    }

    /// Disconnect without retry intent
    fn close_session(&mut self) {
        tracing::info!("Realtime channel closed");
        self.credential = None;
        self.state.reset();
        self.publish();
        self.signals
            .send(ConnectionSignal::Disconnected { will_retry: false });
    }

    fn reject(&mut self, reason: String) {
        tracing::error!("Realtime channel rejected credential: {reason}");
        self.credential = None;
        self.state.on_failed(reason.clone(), false);
        self.publish();
        self.signals.send(ConnectionSignal::AuthRejected { reason });
    }

    /// Run a single session until it ends
    async fn run_session(&mut self, ws: WsStream, emits: Vec<ClientEmit>) -> SessionEnd {
        let (mut ws_sink, mut ws_stream) = ws.split();

        // 1. Re-join rooms and flush queued emits
        for emit in &emits {
            if let Err(e) = Self::send_emit(&mut ws_sink, emit).await {
                return SessionEnd::Lost(format!("resubscribe failed: {e}"));
            }
        }
        if !emits.is_empty() {
            tracing::info!(count = emits.len(), "Rooms resubscribed");
        }

        // 2. Heartbeat
        let liveness = self.heartbeat_interval.map(|i| i + self.heartbeat_timeout);
        let mut ping_interval =
            tokio::time::interval(self.heartbeat_interval.unwrap_or(Duration::from_secs(3600)));
        ping_interval.tick().await; // skip immediate tick
        let mut last_seen = Instant::now();

        // 3. Main select loop
        let end = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break SessionEnd::Shutdown,

                _ = ping_interval.tick(), if liveness.is_some() => {
                    if let Some(limit) = liveness
                        && last_seen.elapsed() > limit
                    {
                        break SessionEnd::Lost("heartbeat timeout".to_string());
                    }
                    if let Err(e) = Self::send_emit(&mut ws_sink, &ClientEmit::Ping).await {
                        break SessionEnd::Lost(format!("ping failed: {e}"));
                    }
                }

                cmd = self.commands.recv() => match cmd {
                    None => break SessionEnd::Shutdown,
                    Some(ConnectionCommand::Disconnect) => break SessionEnd::Closed,
                    Some(ConnectionCommand::Connect(credential)) => {
                        if self.credential.as_ref() != Some(&credential) {
                            self.credential = Some(credential);
                            break SessionEnd::Restart;
                        }
                    }
                    Some(ConnectionCommand::Subscribe(room)) => {
                        let emit = self.state.subscribe(room);
                        self.publish();
                        if let Some(emit) = emit
                            && let Err(e) = Self::send_emit(&mut ws_sink, &emit).await
                        {
                            break SessionEnd::Lost(format!("join failed: {e}"));
                        }
                    }
                    Some(ConnectionCommand::Unsubscribe(room)) => {
                        let emit = self.state.unsubscribe(room);
                        self.publish();
                        if let Some(emit) = emit
                            && let Err(e) = Self::send_emit(&mut ws_sink, &emit).await
                        {
                            break SessionEnd::Lost(format!("leave failed: {e}"));
                        }
                    }
                    Some(ConnectionCommand::RetryNow) => {}
                },

                msg = ws_stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        if let Some(end) = self.handle_text(&text) {
                            break end;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_seen = Instant::now();
                        let _ = ws_sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        break SessionEnd::Lost("closed by server".to_string());
                    }
                    Some(Ok(_)) => {
                        last_seen = Instant::now();
                    }
                    Some(Err(e)) => break SessionEnd::Lost(e.to_string()),
                    None => break SessionEnd::Lost("stream ended".to_string()),
                },
            }
        };

        let _ = ws_sink.close().await;
        end
    }

    /// Route one inbound text frame
    fn handle_text(&self, text: &str) -> Option<SessionEnd> {
        let frame = match EventFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Invalid frame from server: {e}");
                return None;
            }
        };

        match frame.lifecycle() {
            Some(LifecycleSignal::Connect) | Some(LifecycleSignal::Pong) => {
                tracing::trace!(event = %frame.event, "Lifecycle frame");
                None
            }
            Some(LifecycleSignal::Reconnect) => {
                tracing::info!("Server reports resumed session");
                self.signals.send(ConnectionSignal::Connected);
                None
            }
            Some(LifecycleSignal::Disconnect { reason }) => Some(SessionEnd::Lost(
                reason.unwrap_or_else(|| "server disconnect".to_string()),
            )),
            Some(LifecycleSignal::ConnectError { message }) => Some(SessionEnd::Rejected(
                message.unwrap_or_else(|| "connect_error".to_string()),
            )),
            None => {
                self.signals.send(ConnectionSignal::Event(frame));
                None
            }
        }
    }

    async fn send_emit(ws_sink: &mut WsSink, emit: &ClientEmit) -> SyncResult<()> {
        ws_sink.send(transport::encode(emit)?).await?;
        Ok(())
    }
}
