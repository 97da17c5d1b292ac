//! SyncEngine: single writer of the dashboard state
//!
//! Commands from the UI side, signals from the connection manager and REST
//! completions all arrive on one queue and are applied in arrival order by
//! one task. Nothing in the loop awaits network I/O.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};
use shared::models::{Order, OrderStatus};
use shared::sync::ViewFilter;
use shared::{ResourceType, Room};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::backend::SyncBackend;
use crate::config::SyncConfig;
use crate::connection::{
    ConnectionHandle, ConnectionManager, ConnectionSignal, ConnectionSnapshot, ConnectionStatus,
    SignalSender,
};
use crate::dispatcher::{DispatchOutcome, DispatchStats, EventDispatcher};
use crate::error::{SyncError, SyncResult};
use crate::http::HttpSyncBackend;
use crate::reconcile::{Completion, Reconciler, SyncMode};
use crate::session::Credential;
use crate::state::DashboardState;

/// Requests from the application
#[derive(Debug)]
pub enum Command {
    Login(Credential),
    Logout,
    Subscribe(Room),
    Unsubscribe(Room),
    /// Dashboard became visible again
    ForegroundRegained,
    /// Network connectivity came back
    NetworkOnline,
    TriggerSync {
        resource: ResourceType,
        mode: SyncMode,
    },
    RefreshView {
        resource: ResourceType,
        outlet_id: String,
        filter: ViewFilter,
        reply: oneshot::Sender<SyncResult<usize>>,
    },
    UpdateOrderStatus {
        order_id: String,
        status: OrderStatus,
        reply: oneshot::Sender<SyncResult<Order>>,
    },
    /// Replies once every earlier input has been applied
    Barrier(oneshot::Sender<()>),
}

/// Everything the engine loop consumes
#[derive(Debug)]
pub enum EngineInput {
    Command(Command),
    Connection(ConnectionSignal),
    Completed(Completion),
}

pub struct SyncEngine {
    state: Arc<RwLock<DashboardState>>,
    dispatcher: EventDispatcher,
    reconciler: Reconciler,
    connection: ConnectionHandle,
    input_tx: mpsc::UnboundedSender<EngineInput>,
    input_rx: mpsc::UnboundedReceiver<EngineInput>,
    shutdown: CancellationToken,
}

impl SyncEngine {
    pub fn new(
        backend: Arc<dyn SyncBackend>,
        connection: ConnectionHandle,
        shutdown: CancellationToken,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(RwLock::new(DashboardState::new())),
            dispatcher: EventDispatcher::new(),
            reconciler: Reconciler::new(backend, input_tx.clone()),
            connection,
            input_tx,
            input_rx,
            shutdown,
        }
    }

    /// Sender for the connection manager
    pub fn signal_sender(&self) -> SignalSender {
        SignalSender::new(self.input_tx.clone())
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            input: self.input_tx.clone(),
            state: self.state.clone(),
            connection: self.connection.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Main run loop
    pub async fn run(mut self) {
        tracing::info!("SyncEngine started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                }
            }
        }

        let DispatchStats {
            applied,
            deleted,
            stale,
            snapshots,
            malformed,
        } = self.dispatcher.stats();
        tracing::info!(applied, deleted, stale, snapshots, malformed, "SyncEngine stopped");
    }

    fn handle_input(&mut self, input: EngineInput) {
        let shared = self.state.clone();
        let mut state = shared.write();
        match input {
            EngineInput::Command(command) => self.handle_command(&mut state, command),
            EngineInput::Connection(signal) => self.handle_signal(&mut state, signal),
            EngineInput::Completed(completion) => self.reconciler.complete(&mut state, completion),
        }
    }

    fn handle_command(&mut self, state: &mut DashboardState, command: Command) {
        match command {
            Command::Login(credential) => {
                let session = state.login(credential.clone());
                tracing::info!(session = %session, "Session started");
                self.connection.connect(credential);
                self.reconciler.trigger_all(state, SyncMode::Delta);
            }
            Command::Logout => {
                if let Some(session) = state.logout() {
                    tracing::info!(session = %session, "Session ended, state cleared");
                }
                self.connection.disconnect();
            }
            Command::Subscribe(room) => {
                tracing::debug!(room = %room, "Subscribe");
                self.connection.subscribe(room);
            }
            Command::Unsubscribe(room) => {
                tracing::debug!(room = %room, "Unsubscribe");
                self.connection.unsubscribe(room);
            }
            Command::ForegroundRegained => {
                tracing::debug!("Foreground regained");
                self.reconciler.trigger_all(state, SyncMode::Delta);
            }
            Command::NetworkOnline => {
                tracing::info!("Network online");
                self.reconciler.trigger_all(state, SyncMode::Delta);
                self.connection.retry_now();
            }
            Command::TriggerSync { resource, mode } => {
                self.reconciler.trigger(state, resource, mode);
            }
            Command::RefreshView {
                resource,
                outlet_id,
                filter,
                reply,
            } => {
                self.reconciler
                    .refresh_view(state, resource, outlet_id, filter, reply);
            }
            Command::UpdateOrderStatus {
                order_id,
                status,
                reply,
            } => {
                self.reconciler
                    .update_order_status(state, order_id, status, reply);
            }
            Command::Barrier(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_signal(&mut self, state: &mut DashboardState, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Connected => {
                let started = self.reconciler.trigger_all(state, SyncMode::Delta);
                tracing::info!(started, "Channel connected, reconciling");
            }
            ConnectionSignal::Disconnected { will_retry } => {
                tracing::info!(will_retry, "Channel disconnected");
            }
            ConnectionSignal::AuthRejected { reason } => {
                tracing::error!("Channel authentication failed: {reason}");
            }
            ConnectionSignal::CredentialExpired => {
                tracing::error!("Credential expired, realtime updates stopped");
            }
            ConnectionSignal::Event(frame) => {
                if state.session().is_none() {
                    tracing::debug!(event = %frame.event, "Event outside a session dropped");
                    return;
                }
                if let DispatchOutcome::SnapshotRequired(request) =
                    self.dispatcher.dispatch(state, frame)
                {
                    for resource in request.resources() {
                        self.reconciler.trigger(state, resource, SyncMode::Full);
                    }
                }
            }
        }
    }
}

/// Cloneable client of a running engine
#[derive(Clone)]
pub struct SyncHandle {
    input: mpsc::UnboundedSender<EngineInput>,
    state: Arc<RwLock<DashboardState>>,
    connection: ConnectionHandle,
    shutdown: CancellationToken,
}

impl SyncHandle {
    fn command(&self, command: Command) -> SyncResult<()> {
        self.input
            .send(EngineInput::Command(command))
            .map_err(|_| SyncError::Internal("sync engine stopped".to_string()))
    }

    pub fn login(&self, credential: Credential) -> SyncResult<()> {
        self.command(Command::Login(credential))
    }

    pub fn logout(&self) -> SyncResult<()> {
        self.command(Command::Logout)
    }

    pub fn subscribe(&self, room: Room) -> SyncResult<()> {
        self.command(Command::Subscribe(room))
    }

    pub fn unsubscribe(&self, room: Room) -> SyncResult<()> {
        self.command(Command::Unsubscribe(room))
    }

    pub fn foreground_regained(&self) -> SyncResult<()> {
        self.command(Command::ForegroundRegained)
    }

    pub fn network_online(&self) -> SyncResult<()> {
        self.command(Command::NetworkOnline)
    }

    pub fn trigger_sync(&self, resource: ResourceType, mode: SyncMode) -> SyncResult<()> {
        self.command(Command::TriggerSync { resource, mode })
    }

    /// Fetch a filtered outlet view and make the store hold exactly it
    pub async fn refresh_view(
        &self,
        resource: ResourceType,
        outlet_id: impl Into<String>,
        filter: ViewFilter,
    ) -> SyncResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::RefreshView {
            resource,
            outlet_id: outlet_id.into(),
            filter,
            reply,
        })?;
        rx.await
            .map_err(|_| SyncError::Internal("sync engine dropped request".to_string()))?
    }

    /// Change an order's status; returns the order as stored after merge
    pub async fn update_order_status(
        &self,
        order_id: impl Into<String>,
        status: OrderStatus,
    ) -> SyncResult<Order> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::UpdateOrderStatus {
            order_id: order_id.into(),
            status,
            reply,
        })?;
        rx.await
            .map_err(|_| SyncError::Internal("sync engine dropped request".to_string()))?
    }

    /// Wait until every input queued before this call has been applied
    pub async fn barrier(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Barrier(reply))?;
        rx.await
            .map_err(|_| SyncError::Internal("sync engine stopped".to_string()))
    }

    /// Read access to the state; do not hold across `.await`
    pub fn state(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read()
    }

    pub fn connection(&self) -> ConnectionSnapshot {
        self.connection.snapshot()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.connection.watch()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Log out and stop the tasks once the channel has closed
    ///
    /// 先等待连接管理器发送关闭帧，超过 `grace` 仍未关闭则直接取消
    pub async fn close(&self, grace: Duration) -> SyncResult<()> {
        let mut connection = self.connection.watch();
        self.logout()?;
        self.barrier().await?;

        let closed = tokio::time::timeout(
            grace,
            connection.wait_for(|s| s.status == ConnectionStatus::Disconnected),
        )
        .await;
        if !matches!(closed, Ok(Ok(_))) {
            tracing::warn!("Realtime channel did not close in time");
        }
        self.shutdown();
        Ok(())
    }
}

/// Wire the HTTP backend, connection manager and engine, and spawn them
pub fn start(config: &SyncConfig) -> SyncResult<SyncHandle> {
    let backend = Arc::new(HttpSyncBackend::new(config)?);
    let shutdown = CancellationToken::new();

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(ConnectionSnapshot::default());
    let connection = ConnectionHandle::new(command_tx, snapshot_rx);

    let engine = SyncEngine::new(backend, connection, shutdown.clone());
    let manager = ConnectionManager::new(
        config,
        command_rx,
        snapshot_tx,
        engine.signal_sender(),
        shutdown,
    );
    let handle = engine.handle();

    tokio::spawn(manager.run());
    tokio::spawn(engine.run());
    Ok(handle)
}
