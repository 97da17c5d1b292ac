//! Dashboard state aggregate
//!
//! 四个资源存储、水位线和会话放在同一个聚合里，登出时一次性重置。
//! Only the engine task writes to it; everything else reads.

use shared::ResourceType;
use shared::models::{MenuItem, Order, Outlet, Payment};

use crate::backend::ResourceBatch;
use crate::session::{Credential, Session, SessionId};
use crate::store::{MergeSummary, ResourceStore, StoreControl};
use crate::watermark::{Scope, Watermarks};

#[derive(Debug, Default)]
pub struct DashboardState {
    session: Option<Session>,
    pub(crate) orders: ResourceStore<Order>,
    pub(crate) payments: ResourceStore<Payment>,
    pub(crate) menu_items: ResourceStore<MenuItem>,
    pub(crate) outlets: ResourceStore<Outlet>,
    pub(crate) watermarks: Watermarks,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Session ==========

    /// Start a fresh session; anything left from a previous one is dropped
    pub fn login(&mut self, credential: Credential) -> SessionId {
        self.reset_data();
        let session = Session::start(credential);
        let id = session.id;
        self.session = Some(session);
        id
    }

    /// Atomic teardown of every store and watermark
    pub fn logout(&mut self) -> Option<SessionId> {
        self.reset_data();
        self.session.take().map(|s| s.id)
    }

    fn reset_data(&mut self) {
        for resource in ResourceType::ALL {
            self.store_mut(resource).reset();
        }
        self.watermarks.reset();
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.session.as_ref().map(|s| &s.credential)
    }

    /// Whether work started under `session` may still touch the state
    pub fn is_current(&self, session: SessionId) -> bool {
        self.session_id() == Some(session)
    }

    // ========== Stores ==========

    pub fn orders(&self) -> &ResourceStore<Order> {
        &self.orders
    }

    pub fn payments(&self) -> &ResourceStore<Payment> {
        &self.payments
    }

    pub fn menu_items(&self) -> &ResourceStore<MenuItem> {
        &self.menu_items
    }

    pub fn outlets(&self) -> &ResourceStore<Outlet> {
        &self.outlets
    }

    pub fn watermarks(&self) -> &Watermarks {
        &self.watermarks
    }

    pub fn watermark(&self, resource: ResourceType, outlet_id: &str) -> Option<u64> {
        self.watermarks.get(&Scope::new(resource, outlet_id))
    }

    pub fn store(&self, resource: ResourceType) -> &dyn StoreControl {
        match resource {
            ResourceType::Order => &self.orders,
            ResourceType::Payment => &self.payments,
            ResourceType::MenuItem => &self.menu_items,
            ResourceType::Outlet => &self.outlets,
        }
    }

    pub fn store_mut(&mut self, resource: ResourceType) -> &mut dyn StoreControl {
        match resource {
            ResourceType::Order => &mut self.orders,
            ResourceType::Payment => &mut self.payments,
            ResourceType::MenuItem => &mut self.menu_items,
            ResourceType::Outlet => &mut self.outlets,
        }
    }

    /// `mergeBatch` into the store the batch belongs to
    pub fn apply_batch(&mut self, batch: ResourceBatch) -> MergeSummary {
        match batch {
            ResourceBatch::Orders(items) => self.orders.merge_batch(items),
            ResourceBatch::Payments(items) => self.payments.merge_batch(items),
            ResourceBatch::MenuItems(items) => self.menu_items.merge_batch(items),
            ResourceBatch::Outlets(items) => self.outlets.merge_batch(items),
        }
    }

    /// `replaceView` into the store the batch belongs to
    pub fn replace_view(&mut self, batch: ResourceBatch) -> MergeSummary {
        match batch {
            ResourceBatch::Orders(items) => self.orders.replace_view(items),
            ResourceBatch::Payments(items) => self.payments.replace_view(items),
            ResourceBatch::MenuItems(items) => self.menu_items.replace_view(items),
            ResourceBatch::Outlets(items) => self.outlets.replace_view(items),
        }
    }

    // ========== Derived reads ==========

    pub fn orders_for_outlet(&self, outlet_id: &str) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self.orders.for_outlet(outlet_id).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    pub fn payments_for_order(&self, order_id: &str) -> Vec<&Payment> {
        let Some(order) = self.orders.get(order_id) else {
            return Vec::new();
        };
        self.payments
            .for_outlet(&order.outlet_id)
            .filter(|payment| payment.order_id == order_id)
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.orders.is_consistent()
            && self.payments.is_consistent()
            && self.menu_items.is_consistent()
            && self.outlets.is_consistent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use shared::models::{OrderStatus, OrderType, PaymentStatus};

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn order(id: &str, outlet: &str, created: &str) -> Order {
        Order {
            id: id.into(),
            outlet_id: outlet.into(),
            created_at: at(created),
            updated_at: at(created),
            sequence_id: None,
            status: OrderStatus::Pending,
            order_type: OrderType::Takeaway,
            order_number: None,
            items: vec![],
            total_amount: Default::default(),
            customer_name: None,
            table_number: None,
            payment_id: None,
            notes: None,
        }
    }

    fn payment(id: &str, order_id: &str, outlet: &str) -> Payment {
        Payment {
            id: id.into(),
            outlet_id: outlet.into(),
            created_at: at("2024-05-01T10:00:00Z"),
            updated_at: at("2024-05-01T10:00:00Z"),
            sequence_id: None,
            order_id: order_id.into(),
            amount: Default::default(),
            currency: None,
            method: "card".into(),
            status: PaymentStatus::Paid,
            reference: None,
        }
    }

    #[test]
    fn test_logout_resets_everything() {
        let mut state = DashboardState::new();
        let session = state.login(Credential::new("tok"));
        state.apply_batch(ResourceBatch::Orders(vec![order(
            "ord-1",
            "o-1",
            "2024-05-01T10:00:00Z",
        )]));
        state.watermarks.advance(&Scope::new(ResourceType::Order, "o-1"), Some(4));
        state.store_mut(ResourceType::Order).begin_sync();

        assert_eq!(state.logout(), Some(session));
        assert!(state.orders().is_empty());
        assert!(state.watermarks().is_empty());
        assert!(!state.store(ResourceType::Order).is_syncing());
        assert!(!state.is_current(session));
    }

    #[test]
    fn test_relogin_is_a_new_session() {
        let mut state = DashboardState::new();
        let first = state.login(Credential::new("a"));
        let second = state.login(Credential::new("b"));
        assert_ne!(first, second);
        assert!(state.is_current(second));
        assert!(!state.is_current(first));
    }

    #[test]
    fn test_derived_reads() {
        let mut state = DashboardState::new();
        state.apply_batch(ResourceBatch::Orders(vec![
            order("ord-1", "o-1", "2024-05-01T10:00:00Z"),
            order("ord-2", "o-1", "2024-05-01T11:00:00Z"),
            order("ord-3", "o-2", "2024-05-01T12:00:00Z"),
        ]));
        state.apply_batch(ResourceBatch::Payments(vec![
            payment("pay-1", "ord-1", "o-1"),
            payment("pay-2", "ord-2", "o-1"),
        ]));

        let ids: Vec<&str> = state
            .orders_for_outlet("o-1")
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(ids, ["ord-2", "ord-1"]);

        let payments = state.payments_for_order("ord-1");
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].id, "pay-1");
        assert!(state.payments_for_order("ord-9").is_empty());
        assert!(state.is_consistent());
    }
}
