//! REST sync envelopes
//!
//! The entity array sits under a per-resource key (`orders`, `menuItems`,
//! ...), so envelopes are read from a `serde_json::Value` rather than a
//! fixed struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::models::{Order, OrderRecord, OrderType};
use crate::resource::{Entity, ResourceType, WireRecord};

/// `GET /sync/<resource>?since=` response
#[derive(Debug, Clone)]
pub struct DeltaEnvelope {
    pub items: Vec<Value>,
    /// Server clock at the time of the query; the next `since`
    pub synced_at: DateTime<Utc>,
}

/// `GET /<resource>/outlet/<outletId>` response
#[derive(Debug, Clone)]
pub struct ViewEnvelope {
    pub items: Vec<Value>,
    pub last_sequence_id: Option<u64>,
}

fn check_success(body: &Value) -> ModelResult<()> {
    match body.get("success").and_then(Value::as_bool) {
        Some(true) => Ok(()),
        Some(false) => Err(ModelError::Rejected(
            body.get("message")
                .and_then(Value::as_str)
                .unwrap_or("success=false")
                .to_string(),
        )),
        None => Err(ModelError::MissingField("success")),
    }
}

fn take_items(body: &mut Value, resource: ResourceType) -> ModelResult<Vec<Value>> {
    match body.get_mut(resource.collection_key()).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(ModelError::MissingField("entity list")),
        Some(other) => Err(ModelError::invalid_payload(
            resource.collection_key(),
            format!("expected array, got {other}"),
        )),
    }
}

impl DeltaEnvelope {
    pub fn from_value(resource: ResourceType, mut body: Value) -> ModelResult<Self> {
        check_success(&body)?;
        let items = take_items(&mut body, resource)?;
        let synced_at = body
            .get("syncedAt")
            .cloned()
            .ok_or(ModelError::MissingField("syncedAt"))?;
        let synced_at: DateTime<Utc> = serde_json::from_value(synced_at)?;
        Ok(Self { items, synced_at })
    }
}

impl ViewEnvelope {
    pub fn from_value(resource: ResourceType, mut body: Value) -> ModelResult<Self> {
        check_success(&body)?;
        let items = take_items(&mut body, resource)?;
        let last_sequence_id = body.get("lastSequenceId").and_then(Value::as_u64);
        Ok(Self {
            items,
            last_sequence_id,
        })
    }
}

/// Decode and normalize a batch of raw entities.
///
/// A malformed item is skipped with a warning so one bad record cannot
/// hold back the rest of the batch.
pub fn decode_entities<E: Entity>(items: Vec<Value>) -> Vec<E> {
    items
        .into_iter()
        .filter_map(|item| {
            match serde_json::from_value::<E::Record>(item)
                .map_err(ModelError::from)
                .and_then(WireRecord::normalize)
            {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(resource = %E::RESOURCE, "Skipping malformed entity: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Decode the body of `PUT /order/<id>/status`
///
/// 服务端可能直接返回订单，也可能包在 `{ success, order }` 里
pub fn decode_updated_order(mut body: Value) -> ModelResult<Order> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        check_success(&body)?;
    }
    let nested = body.get_mut("order").map(Value::take);
    let record = match nested {
        Some(order @ Value::Object(_)) => order,
        _ => body,
    };
    serde_json::from_value::<OrderRecord>(record)
        .map_err(ModelError::from)
        .and_then(WireRecord::normalize)
        .map_err(|e| ModelError::invalid_payload("order status update", e))
}

/// Query for a filtered outlet view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFilter {
    pub order_type: Option<OrderType>,
    pub status: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl ViewFilter {
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string pairs in wire order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(order_type) = self.order_type {
            pairs.push(("orderType", order_type.to_string()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(since) = self.since {
            pairs.push(("since", since.to_rfc3339()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}
