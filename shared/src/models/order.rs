//! Order Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Reference, either, either_ref};
use crate::error::ModelResult;
use crate::resource::{Entity, ResourceType, WireRecord};

/// Order status as shown on the vendor dashboard
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Preparing,
    Ready,
    OutForDelivery,
    Completed,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// How the order is fulfilled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    DineIn,
    Takeaway,
    Delivery,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::DineIn => write!(f, "dine_in"),
            OrderType::Takeaway => write!(f, "takeaway"),
            OrderType::Delivery => write!(f, "delivery"),
        }
    }
}

/// Order line (normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Menu item reference (String ID)
    pub menu_item_id: String,
    pub name: String,
    pub quantity: u32,
    /// Price in currency unit
    pub unit_price: Decimal,
    pub note: Option<String>,
}

/// Order entity (normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub outlet_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub order_number: Option<String>,
    pub items: Vec<OrderLine>,
    /// Total amount in currency unit
    pub total_amount: Decimal,
    pub customer_name: Option<String>,
    pub table_number: Option<String>,
    /// Payment reference (String ID)
    pub payment_id: Option<String>,
    pub notes: Option<String>,
}

/// Order line as sent by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRecord {
    #[serde(default)]
    pub menu_item_id: Option<Reference>,
    #[serde(default)]
    pub menu_item: Option<Reference>,
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Order as sent by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<Reference>,
    #[serde(default)]
    pub outlet: Option<Reference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sequence_id: Option<u64>,
    pub status: OrderStatus,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineRecord>,
    #[serde(default)]
    pub total_amount: Decimal,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub payment_id: Option<Reference>,
    #[serde(default)]
    pub payment: Option<Reference>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl WireRecord for OrderRecord {
    type Entity = Order;

    fn normalize(self) -> ModelResult<Order> {
        let items = self
            .items
            .into_iter()
            .map(|line| {
                Ok(OrderLine {
                    menu_item_id: either_ref("menuItemId", line.menu_item_id, line.menu_item)?,
                    name: line.name,
                    quantity: line.quantity,
                    unit_price: line.unit_price.or(line.price).unwrap_or_default(),
                    note: line.note,
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(Order {
            id: either("id", self.id, self.object_id)?,
            outlet_id: either_ref("outletId", self.outlet_id, self.outlet)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sequence_id: self.sequence_id,
            status: self.status,
            order_type: self.order_type,
            order_number: self.order_number,
            items,
            total_amount: self.total_amount,
            customer_name: self.customer_name,
            table_number: self.table_number,
            payment_id: self.payment_id.or(self.payment).map(Reference::into_id),
            notes: self.notes,
        })
    }
}

impl Entity for Order {
    type Record = OrderRecord;

    const RESOURCE: ResourceType = ResourceType::Order;

    fn id(&self) -> &str {
        &self.id
    }

    fn outlet_id(&self) -> &str {
        &self.outlet_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn sequence_id(&self) -> Option<u64> {
        self.sequence_id
    }
}

/// Update status payload (`PUT /order/<id>/status`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdateStatus {
    pub status: OrderStatus,
}
