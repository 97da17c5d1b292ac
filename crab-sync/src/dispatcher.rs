//! Event dispatcher
//!
//! Routes realtime frames to the addressed store. For scope `s`:
//!
//! - a frame whose sequence id is `<= watermark[s]` is dropped
//! - upserts go through last-writer-wins, deletes remove outright
//! - the watermark then moves to `max(watermark[s], seq)`
//!
//! A frame that fails payload validation is dropped without moving the
//! watermark, so a later well-formed copy can still apply.

use shared::message::{EntityChange, EntityEvent, SnapshotRequest};
use shared::{DomainEvent, Entity, EventFrame, ResourceType};

use crate::merge::MergeOutcome;
use crate::state::DashboardState;
use crate::store::ResourceStore;
use crate::watermark::{Scope, Watermarks};

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Upsert merged into the store
    Applied {
        resource: ResourceType,
        outcome: MergeOutcome,
    },
    /// Delete applied; `removed` is false if the id was unknown
    Deleted { resource: ResourceType, removed: bool },
    /// At or below the scope watermark
    Stale {
        resource: ResourceType,
        sequence_id: u64,
        watermark: u64,
    },
    /// Caller should schedule a full reconciliation
    SnapshotRequired(SnapshotRequest),
    /// Unknown event name or invalid payload
    Malformed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub applied: u64,
    pub deleted: u64,
    pub stale: u64,
    pub snapshots: u64,
    pub malformed: u64,
}

#[derive(Debug, Default)]
pub struct EventDispatcher {
    stats: DispatchStats,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn dispatch(&mut self, state: &mut DashboardState, frame: EventFrame) -> DispatchOutcome {
        let event_name = frame.event.clone();
        let outcome = match DomainEvent::decode(frame) {
            Ok(DomainEvent::Order(event)) => {
                apply_entity(&mut state.orders, &mut state.watermarks, event)
            }
            Ok(DomainEvent::Payment(event)) => {
                apply_entity(&mut state.payments, &mut state.watermarks, event)
            }
            Ok(DomainEvent::MenuItem(event)) => {
                apply_entity(&mut state.menu_items, &mut state.watermarks, event)
            }
            Ok(DomainEvent::Outlet(event)) => {
                apply_entity(&mut state.outlets, &mut state.watermarks, event)
            }
            Ok(DomainEvent::SnapshotRequired(request)) => {
                tracing::info!(
                    resource = ?request.resource,
                    outlet_id = ?request.outlet_id,
                    "Server requested snapshot"
                );
                DispatchOutcome::SnapshotRequired(request)
            }
            Err(e) => {
                tracing::warn!(event = %event_name, "Dropping malformed event: {}", e);
                DispatchOutcome::Malformed(e.to_string())
            }
        };

        match &outcome {
            DispatchOutcome::Applied { .. } => self.stats.applied += 1,
            DispatchOutcome::Deleted { .. } => self.stats.deleted += 1,
            DispatchOutcome::Stale { .. } => self.stats.stale += 1,
            DispatchOutcome::SnapshotRequired(_) => self.stats.snapshots += 1,
            DispatchOutcome::Malformed(_) => self.stats.malformed += 1,
        }
        outcome
    }
}

fn apply_entity<E: Entity>(
    store: &mut ResourceStore<E>,
    watermarks: &mut Watermarks,
    event: EntityEvent<E>,
) -> DispatchOutcome {
    let resource = E::RESOURCE;
    let scope = Scope::new(resource, event.outlet_id());

    if let (Some(sequence_id), Some(watermark)) = (event.sequence_id, watermarks.get(&scope))
        && sequence_id <= watermark
    {
        tracing::debug!(
            resource = %resource,
            id = %event.entity_id(),
            sequence_id,
            watermark,
            "Discarding stale event"
        );
        return DispatchOutcome::Stale {
            resource,
            sequence_id,
            watermark,
        };
    }

    let sequence_id = event.sequence_id;
    let outcome = match event.change {
        EntityChange::Upsert(entity) => {
            let outcome = store.upsert(entity);
            DispatchOutcome::Applied { resource, outcome }
        }
        EntityChange::Delete(tombstone) => {
            let removed = store.remove(&tombstone.id).is_some();
            DispatchOutcome::Deleted { resource, removed }
        }
    };
    watermarks.advance(&scope, sequence_id);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourceBatch;
    use crate::session::Credential;
    use serde_json::json;
    use shared::models::{Order, OrderStatus, OrderType};

    const T0: &str = "2024-05-01T10:00:00Z";
    const T1: &str = "2024-05-01T10:05:00Z";
    const T2: &str = "2024-05-01T10:10:00Z";

    fn order(updated_at: &str, status: OrderStatus) -> Order {
        Order {
            id: "ord-a".into(),
            outlet_id: "o-1".into(),
            created_at: T0.parse().unwrap(),
            updated_at: updated_at.parse().unwrap(),
            sequence_id: None,
            status,
            order_type: OrderType::DineIn,
            order_number: None,
            items: vec![],
            total_amount: Default::default(),
            customer_name: None,
            table_number: None,
            payment_id: None,
            notes: None,
        }
    }

    fn order_frame(event: &str, updated_at: &str, status: &str, seq: u64) -> EventFrame {
        EventFrame::new(
            event,
            json!({
                "_id": "ord-a",
                "outlet": { "_id": "o-1", "name": "Main St" },
                "createdAt": T0,
                "updatedAt": updated_at,
                "status": status
            }),
        )
        .with_sequence(seq)
    }

    fn delete_frame(seq: u64) -> EventFrame {
        EventFrame::new("ORDER_DELETED", json!({ "id": "ord-a", "outletId": "o-1" }))
            .with_sequence(seq)
    }

    /// Order A pending at T0, watermark 3
    fn seeded() -> DashboardState {
        let mut state = DashboardState::new();
        state.login(Credential::new("tok"));
        state.apply_batch(ResourceBatch::Orders(vec![order(T0, OrderStatus::Pending)]));
        state
            .watermarks
            .advance(&Scope::new(ResourceType::Order, "o-1"), Some(3));
        state
    }

    fn status_of(state: &DashboardState) -> OrderStatus {
        state.orders().get("ord-a").unwrap().status
    }

    #[test]
    fn test_newer_status_change_applies() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        let outcome = dispatcher.dispatch(
            &mut state,
            order_frame("ORDER_STATUS_CHANGED", T1, "preparing", 5),
        );

        assert_eq!(
            outcome,
            DispatchOutcome::Applied {
                resource: ResourceType::Order,
                outcome: MergeOutcome::Replaced
            }
        );
        assert_eq!(status_of(&state), OrderStatus::Preparing);
        assert_eq!(state.watermark(ResourceType::Order, "o-1"), Some(5));
    }

    #[test]
    fn test_event_below_watermark_is_discarded() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        let outcome = dispatcher.dispatch(
            &mut state,
            order_frame("ORDER_STATUS_CHANGED", T1, "preparing", 2),
        );

        assert!(matches!(outcome, DispatchOutcome::Stale { sequence_id: 2, watermark: 3, .. }));
        assert_eq!(status_of(&state), OrderStatus::Pending);
        assert_eq!(state.watermark(ResourceType::Order, "o-1"), Some(3));
        assert_eq!(dispatcher.stats().stale, 1);
    }

    #[test]
    fn test_stale_reconciliation_keeps_pushed_copy() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.dispatch(&mut state, order_frame("ORDER_UPDATED", T2, "ready", 4));

        state.apply_batch(ResourceBatch::Orders(vec![order(T0, OrderStatus::Pending)]));

        let stored = state.orders().get("ord-a").unwrap();
        assert_eq!(stored.updated_at, T2.parse::<chrono::DateTime<chrono::Utc>>().unwrap());
        assert_eq!(stored.status, OrderStatus::Ready);
    }

    #[test]
    fn test_replaying_an_event_is_idempotent() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();
        let frame = order_frame("ORDER_STATUS_CHANGED", T1, "accepted", 6);

        dispatcher.dispatch(&mut state, frame.clone());
        let once = state.orders().get("ord-a").cloned();
        let second = dispatcher.dispatch(&mut state, frame);

        assert!(matches!(second, DispatchOutcome::Stale { .. }));
        assert_eq!(state.orders().get("ord-a").cloned(), once);
        assert_eq!(state.orders().len(), 1);
    }

    #[test]
    fn test_unsequenced_updates_converge_regardless_of_order() {
        let early = EventFrame::new(
            "ORDER_UPDATED",
            order_frame("ORDER_UPDATED", T1, "accepted", 0).payload,
        );
        let late = EventFrame::new(
            "ORDER_UPDATED",
            order_frame("ORDER_UPDATED", T2, "ready", 0).payload,
        );

        let mut forward = seeded();
        let mut backward = seeded();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.dispatch(&mut forward, early.clone());
        dispatcher.dispatch(&mut forward, late.clone());
        dispatcher.dispatch(&mut backward, late);
        dispatcher.dispatch(&mut backward, early);

        assert_eq!(status_of(&forward), OrderStatus::Ready);
        assert_eq!(forward.orders().get("ord-a"), backward.orders().get("ord-a"));
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();
        let mut last = state.watermark(ResourceType::Order, "o-1");

        for (seq, at) in [(7, T1), (4, T2), (9, T2), (8, T2)] {
            dispatcher.dispatch(&mut state, order_frame("ORDER_UPDATED", at, "ready", seq));
            let mark = state.watermark(ResourceType::Order, "o-1");
            assert!(mark >= last);
            last = mark;
        }
        assert_eq!(last, Some(9));
    }

    #[test]
    fn test_delete_wins_over_older_update() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        let deleted = dispatcher.dispatch(&mut state, delete_frame(10));
        assert_eq!(
            deleted,
            DispatchOutcome::Deleted {
                resource: ResourceType::Order,
                removed: true
            }
        );

        let late_update = dispatcher.dispatch(
            &mut state,
            order_frame("ORDER_UPDATED", T2, "ready", 8),
        );
        assert!(matches!(late_update, DispatchOutcome::Stale { .. }));
        assert!(!state.orders().contains("ord-a"));
        assert!(state.is_consistent());
    }

    #[test]
    fn test_delete_at_watermark_is_ignored() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        dispatcher.dispatch(&mut state, delete_frame(3));
        assert!(state.orders().contains("ord-a"));
    }

    #[test]
    fn test_malformed_payload_leaves_watermark() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        let frame = EventFrame::new("ORDER_UPDATED", json!({ "_id": "ord-a" })).with_sequence(20);
        let outcome = dispatcher.dispatch(&mut state, frame);

        assert!(matches!(outcome, DispatchOutcome::Malformed(_)));
        assert_eq!(state.watermark(ResourceType::Order, "o-1"), Some(3));
        assert_eq!(status_of(&state), OrderStatus::Pending);

        let unknown = dispatcher.dispatch(&mut state, EventFrame::new("TABLE_MOVED", json!({})));
        assert!(matches!(unknown, DispatchOutcome::Malformed(_)));
        assert_eq!(dispatcher.stats().malformed, 2);
    }

    #[test]
    fn test_snapshot_required_is_forwarded() {
        let mut state = seeded();
        let mut dispatcher = EventDispatcher::new();

        let outcome = dispatcher.dispatch(
            &mut state,
            EventFrame::new("SNAPSHOT_REQUIRED", json!({ "resource": "payment" })),
        );

        let DispatchOutcome::SnapshotRequired(request) = outcome else {
            panic!("expected snapshot request");
        };
        assert_eq!(request.resources(), vec![ResourceType::Payment]);
    }
}
