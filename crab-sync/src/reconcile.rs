//! Reconciliation client
//!
//! Fetches run as spawned tasks so the engine loop never waits on the
//! network. Each completion comes back through the engine input queue
//! tagged with the session it started under; completions from an older
//! session are dropped without touching the state.

use std::sync::Arc;

use shared::ResourceType;
use shared::models::{Order, OrderStatus};
use shared::sync::ViewFilter;
use tokio::sync::{mpsc, oneshot};

use crate::backend::{DeltaBatch, SyncBackend, ViewBatch};
use crate::engine::EngineInput;
use crate::error::{SyncError, SyncResult};
use crate::merge::MergeOutcome;
use crate::session::SessionId;
use crate::state::DashboardState;
use crate::store::StoreControl;
use crate::watermark::Scope;

/// Delta uses the store's `last_sync_timestamp`; full ignores it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Delta,
    Full,
}

/// Outcome of a spawned REST call
#[derive(Debug)]
pub enum Completion {
    Sync {
        session: SessionId,
        resource: ResourceType,
        result: SyncResult<DeltaBatch>,
    },
    View {
        session: SessionId,
        resource: ResourceType,
        outlet_id: String,
        result: SyncResult<ViewBatch>,
        reply: oneshot::Sender<SyncResult<usize>>,
    },
    StatusUpdate {
        session: SessionId,
        result: SyncResult<Order>,
        reply: oneshot::Sender<SyncResult<Order>>,
    },
}

pub struct Reconciler {
    backend: Arc<dyn SyncBackend>,
    completions: mpsc::UnboundedSender<EngineInput>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn SyncBackend>, completions: mpsc::UnboundedSender<EngineInput>) -> Self {
        Self {
            backend,
            completions,
        }
    }

    /// `triggerSync`: start a fetch unless one is already in flight
    ///
    /// Returns `true` when a fetch was started.
    pub fn trigger(&self, state: &mut DashboardState, resource: ResourceType, mode: SyncMode) -> bool {
        let Some(session) = state.session().cloned() else {
            tracing::debug!(resource = %resource, "No session, sync skipped");
            return false;
        };

        let store = state.store_mut(resource);
        if !store.begin_sync() {
            tracing::debug!(resource = %resource, "Sync already in flight, trigger suppressed");
            return false;
        }
        let since = match mode {
            SyncMode::Delta => store.last_sync_timestamp(),
            SyncMode::Full => None,
        };

        tracing::debug!(resource = %resource, ?mode, since = ?since, "Starting sync");
        let backend = self.backend.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = backend
                .fetch_delta(&session.credential, resource, since)
                .await;
            let _ = tx.send(EngineInput::Completed(Completion::Sync {
                session: session.id,
                resource,
                result,
            }));
        });
        true
    }

    /// Trigger every resource type; returns how many fetches started
    pub fn trigger_all(&self, state: &mut DashboardState, mode: SyncMode) -> usize {
        ResourceType::ALL
            .into_iter()
            .filter(|resource| self.trigger(state, *resource, mode))
            .count()
    }

    pub fn refresh_view(
        &self,
        state: &DashboardState,
        resource: ResourceType,
        outlet_id: String,
        filter: ViewFilter,
        reply: oneshot::Sender<SyncResult<usize>>,
    ) {
        let Some(session) = state.session().cloned() else {
            let _ = reply.send(Err(SyncError::NoSession));
            return;
        };

        let backend = self.backend.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = backend
                .fetch_view(&session.credential, resource, &outlet_id, &filter)
                .await;
            let _ = tx.send(EngineInput::Completed(Completion::View {
                session: session.id,
                resource,
                outlet_id,
                result,
                reply,
            }));
        });
    }

    pub fn update_order_status(
        &self,
        state: &DashboardState,
        order_id: String,
        status: OrderStatus,
        reply: oneshot::Sender<SyncResult<Order>>,
    ) {
        let Some(session) = state.session().cloned() else {
            let _ = reply.send(Err(SyncError::NoSession));
            return;
        };

        let backend = self.backend.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = backend
                .update_order_status(&session.credential, &order_id, status)
                .await;
            let _ = tx.send(EngineInput::Completed(Completion::StatusUpdate {
                session: session.id,
                result,
                reply,
            }));
        });
    }

    /// Apply a completion to the state, guarded by session identity
    pub fn complete(&self, state: &mut DashboardState, completion: Completion) {
        match completion {
            Completion::Sync {
                session,
                resource,
                result,
            } => {
                if !state.is_current(session) {
                    tracing::debug!(resource = %resource, "Discarding sync result from ended session");
                    return;
                }
                state.store_mut(resource).end_sync();
                match result {
                    Ok(delta) => Self::apply_delta(state, resource, delta),
                    Err(e) => {
                        tracing::warn!(resource = %resource, "Sync failed: {}", e);
                        state.store_mut(resource).set_error(Some(e.to_string()));
                    }
                }
            }
            Completion::View {
                session,
                resource,
                outlet_id,
                result,
                reply,
            } => {
                if !state.is_current(session) {
                    tracing::debug!(resource = %resource, "Discarding view result from ended session");
                    let _ = reply.send(Err(SyncError::NoSession));
                    return;
                }
                let outcome = result.map(|view| {
                    let count = view.batch.len();
                    let summary = state.replace_view(view.batch);
                    let scope = Scope::new(resource, outlet_id);
                    let mark = state.watermarks.advance(&scope, view.last_sequence_id);
                    tracing::info!(
                        resource = %resource,
                        scope = %scope,
                        count,
                        removed = summary.removed,
                        watermark = ?mark,
                        "View refreshed"
                    );
                    count
                });
                if let Err(e) = &outcome {
                    tracing::warn!(resource = %resource, "View refresh failed: {}", e);
                }
                let _ = reply.send(outcome);
            }
            Completion::StatusUpdate {
                session,
                result,
                reply,
            } => {
                if !state.is_current(session) {
                    tracing::debug!("Discarding status update from ended session");
                    let _ = reply.send(Err(SyncError::NoSession));
                    return;
                }
                let outcome = result.and_then(|order| {
                    let id = order.id.clone();
                    let merged = state.orders.upsert(order);
                    if merged == MergeOutcome::Retained {
                        tracing::debug!(order_id = %id, "Status update older than stored order");
                    }
                    state
                        .orders
                        .get(&id)
                        .cloned()
                        .ok_or_else(|| SyncError::Internal(format!("order {id} missing after merge")))
                });
                if let Err(e) = &outcome {
                    tracing::warn!("Order status update failed: {}", e);
                }
                let _ = reply.send(outcome);
            }
        }
    }

    fn apply_delta(state: &mut DashboardState, resource: ResourceType, delta: DeltaBatch) {
        let summary = state.apply_batch(delta.batch);
        let store = state.store_mut(resource);
        store.advance_sync_timestamp(delta.synced_at);
        store.set_error(None);
        tracing::info!(
            resource = %resource,
            inserted = summary.inserted,
            replaced = summary.replaced,
            retained = summary.retained,
            synced_at = %delta.synced_at,
            "Sync applied"
        );
    }
}
