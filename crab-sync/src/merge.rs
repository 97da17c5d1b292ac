//! Last-writer-wins merge shared by every store
//!
//! Push events, delta results and snapshot results all go through
//! [`merge_one`]; ties go to the incoming copy so replaying the same
//! entity is a no-op in effect.

use shared::Entity;

/// What a merge did to the stored copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Id was not present
    Inserted,
    /// Incoming copy replaced the stored one
    Replaced,
    /// Stored copy is newer and was kept
    Retained,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, MergeOutcome::Retained)
    }
}

/// `incoming.updatedAt >= existing.updatedAt`
pub fn incoming_wins<E: Entity>(existing: &E, incoming: &E) -> bool {
    incoming.updated_at() >= existing.updated_at()
}

/// Pick the surviving copy of an entity
pub fn merge_one<E: Entity>(existing: E, incoming: E) -> E {
    if incoming_wins(&existing, &incoming) {
        incoming
    } else {
        existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use shared::models::{Order, OrderStatus, OrderType};

    fn order(updated_at: &str, status: OrderStatus) -> Order {
        let at: DateTime<Utc> = updated_at.parse().unwrap();
        Order {
            id: "ord-1".into(),
            outlet_id: "o-1".into(),
            created_at: at,
            updated_at: at,
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

    #[test]
    fn test_newer_incoming_wins() {
        let old = order("2024-05-01T10:00:00Z", OrderStatus::Pending);
        let new = order("2024-05-01T10:05:00Z", OrderStatus::Preparing);
        assert_eq!(merge_one(old.clone(), new.clone()).status, OrderStatus::Preparing);
        assert_eq!(merge_one(new, old).status, OrderStatus::Preparing);
    }

    #[test]
    fn test_tie_goes_to_incoming() {
        let a = order("2024-05-01T10:00:00Z", OrderStatus::Pending);
        let b = order("2024-05-01T10:00:00Z", OrderStatus::Accepted);
        assert!(incoming_wins(&a, &b));
        assert_eq!(merge_one(a, b).status, OrderStatus::Accepted);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = order("2024-05-01T10:00:00Z", OrderStatus::Ready);
        let once = merge_one(a.clone(), a.clone());
        let twice = merge_one(once.clone(), a);
        assert_eq!(once, twice);
    }
}
