//! Reconciliation backend seam
//!
//! The engine only talks to the server's REST contract through
//! [`SyncBackend`]; [`crate::http::HttpSyncBackend`] is the production
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use shared::ResourceType;
use shared::models::{MenuItem, Order, OrderStatus, Outlet, Payment};
use shared::sync::{ViewFilter, decode_entities};

use crate::error::SyncResult;
use crate::session::Credential;

/// Normalized entities for one resource type
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBatch {
    Orders(Vec<Order>),
    Payments(Vec<Payment>),
    MenuItems(Vec<MenuItem>),
    Outlets(Vec<Outlet>),
}

impl ResourceBatch {
    /// Decode raw REST items, skipping malformed ones
    pub fn decode(resource: ResourceType, items: Vec<Value>) -> Self {
        match resource {
            ResourceType::Order => ResourceBatch::Orders(decode_entities(items)),
            ResourceType::Payment => ResourceBatch::Payments(decode_entities(items)),
            ResourceType::MenuItem => ResourceBatch::MenuItems(decode_entities(items)),
            ResourceType::Outlet => ResourceBatch::Outlets(decode_entities(items)),
        }
    }

    pub fn empty(resource: ResourceType) -> Self {
        Self::decode(resource, Vec::new())
    }

    pub fn resource(&self) -> ResourceType {
        match self {
            ResourceBatch::Orders(_) => ResourceType::Order,
            ResourceBatch::Payments(_) => ResourceType::Payment,
            ResourceBatch::MenuItems(_) => ResourceType::MenuItem,
            ResourceBatch::Outlets(_) => ResourceType::Outlet,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResourceBatch::Orders(items) => items.len(),
            ResourceBatch::Payments(items) => items.len(),
            ResourceBatch::MenuItems(items) => items.len(),
            ResourceBatch::Outlets(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of `GET /sync/<resource>?since=`
#[derive(Debug, Clone)]
pub struct DeltaBatch {
    pub batch: ResourceBatch,
    pub synced_at: DateTime<Utc>,
}

/// Result of `GET /<resource>/outlet/<outletId>`
#[derive(Debug, Clone)]
pub struct ViewBatch {
    pub batch: ResourceBatch,
    pub last_sequence_id: Option<u64>,
}

#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Entities updated since `since`; `None` asks for a full snapshot
    async fn fetch_delta(
        &self,
        credential: &Credential,
        resource: ResourceType,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<DeltaBatch>;

    /// Filtered outlet view
    async fn fetch_view(
        &self,
        credential: &Credential,
        resource: ResourceType,
        outlet_id: &str,
        filter: &ViewFilter,
    ) -> SyncResult<ViewBatch>;

    /// `PUT /order/<id>/status`; returns the updated order
    async fn update_order_status(
        &self,
        credential: &Credential,
        order_id: &str,
        status: OrderStatus,
    ) -> SyncResult<Order>;
}
