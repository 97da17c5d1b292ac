//! 实时通道消息类型定义
//!
//! Frames exchanged over the realtime channel between the dashboard and
//! the backend. Inbound frames are loosely typed JSON; `DomainEvent::decode`
//! is where they become a closed union with fixed per-kind payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};
use crate::models::{MenuItem, Order, Outlet, Payment};
use crate::resource::{Entity, ResourceType, WireRecord};

pub mod payload;
pub mod room;

pub use payload::*;
pub use room::*;

/// Server frame as received on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    /// Event name (`ORDER_CREATED`, `SNAPSHOT_REQUIRED`, `connect`, ...)
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_id: Option<u64>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            sequence_id: None,
            payload,
            timestamp: None,
        }
    }

    pub fn with_sequence(mut self, sequence_id: u64) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }

    /// 解析 JSON 文本帧
    pub fn from_json(text: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Channel lifecycle signal carried by this frame, if any
    pub fn lifecycle(&self) -> Option<LifecycleSignal> {
        let message = || {
            self.payload
                .get("message")
                .or_else(|| self.payload.get("reason"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        match self.event.as_str() {
            "connect" => Some(LifecycleSignal::Connect),
            "disconnect" => Some(LifecycleSignal::Disconnect { reason: message() }),
            "reconnect" => Some(LifecycleSignal::Reconnect),
            "connect_error" => Some(LifecycleSignal::ConnectError { message: message() }),
            "pong" => Some(LifecycleSignal::Pong),
            _ => None,
        }
    }
}

/// Lifecycle frames emitted by the server itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Handshake acknowledged
    Connect,
    /// Server is closing the session
    Disconnect { reason: Option<String> },
    /// Server noticed a resumed session
    Reconnect,
    /// Server rejected the credential after upgrade
    ConnectError { message: Option<String> },
    /// Heartbeat reply
    Pong,
}

/// Change kind within a resource's event taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    StatusChanged,
    Deleted,
}

impl ChangeKind {
    fn suffix(self) -> &'static str {
        match self {
            ChangeKind::Created => "CREATED",
            ChangeKind::Updated => "UPDATED",
            ChangeKind::StatusChanged => "STATUS_CHANGED",
            ChangeKind::Deleted => "DELETED",
        }
    }

    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(ChangeKind::Created),
            "UPDATED" => Some(ChangeKind::Updated),
            "STATUS_CHANGED" => Some(ChangeKind::StatusChanged),
            "DELETED" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// Parsed domain event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Change(ResourceType, ChangeKind),
    SnapshotRequired,
}

pub const SNAPSHOT_REQUIRED: &str = "SNAPSHOT_REQUIRED";

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventName::Change(resource, kind) => {
                write!(f, "{}_{}", resource.event_prefix(), kind.suffix())
            }
            EventName::SnapshotRequired => f.write_str(SNAPSHOT_REQUIRED),
        }
    }
}

impl FromStr for EventName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SNAPSHOT_REQUIRED {
            return Ok(EventName::SnapshotRequired);
        }
        ResourceType::ALL
            .iter()
            .find_map(|resource| {
                s.strip_prefix(resource.event_prefix())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .and_then(ChangeKind::from_suffix)
                    .map(|kind| EventName::Change(*resource, kind))
            })
            .ok_or_else(|| ModelError::UnknownEvent(s.to_string()))
    }
}

/// Validated change to a single entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityChange<E> {
    Upsert(E),
    Delete(Tombstone),
}

/// Typed event addressed to one resource store
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEvent<E> {
    pub kind: ChangeKind,
    pub sequence_id: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub change: EntityChange<E>,
}

impl<E: Entity> EntityEvent<E> {
    /// Id of the addressed entity
    pub fn entity_id(&self) -> &str {
        match &self.change {
            EntityChange::Upsert(entity) => entity.id(),
            EntityChange::Delete(tombstone) => &tombstone.id,
        }
    }

    /// Outlet partition the sequence id belongs to
    pub fn outlet_id(&self) -> &str {
        match &self.change {
            EntityChange::Upsert(entity) => entity.outlet_id(),
            EntityChange::Delete(tombstone) => &tombstone.outlet_id,
        }
    }

    fn decode(kind: ChangeKind, frame: EventFrame) -> ModelResult<Self> {
        let event = frame.event;
        let change = if kind == ChangeKind::Deleted {
            let record: TombstoneRecord = serde_json::from_value(frame.payload)
                .map_err(|e| ModelError::invalid_payload(&event, e))?;
            EntityChange::Delete(
                record
                    .normalize()
                    .map_err(|e| ModelError::invalid_payload(&event, e))?,
            )
        } else {
            let record: E::Record = serde_json::from_value(frame.payload)
                .map_err(|e| ModelError::invalid_payload(&event, e))?;
            EntityChange::Upsert(
                record
                    .normalize()
                    .map_err(|e| ModelError::invalid_payload(&event, e))?,
            )
        };

        let embedded_sequence = match &change {
            EntityChange::Upsert(entity) => entity.sequence_id(),
            EntityChange::Delete(tombstone) => tombstone.sequence_id,
        };

        Ok(Self {
            kind,
            sequence_id: frame.sequence_id.or(embedded_sequence),
            timestamp: frame.timestamp,
            change,
        })
    }
}

/// Closed union of every domain event the dashboard understands
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Order(EntityEvent<Order>),
    Payment(EntityEvent<Payment>),
    MenuItem(EntityEvent<MenuItem>),
    Outlet(EntityEvent<Outlet>),
    SnapshotRequired(SnapshotRequest),
}

impl DomainEvent {
    /// Validate a raw frame against the payload schema of its event kind
    pub fn decode(frame: EventFrame) -> ModelResult<Self> {
        let name: EventName = frame.event.parse()?;
        match name {
            EventName::SnapshotRequired => {
                let request = if frame.payload.is_null() {
                    SnapshotRequest::default()
                } else {
                    serde_json::from_value(frame.payload)
                        .map_err(|e| ModelError::invalid_payload(SNAPSHOT_REQUIRED, e))?
                };
                Ok(DomainEvent::SnapshotRequired(request))
            }
            EventName::Change(ResourceType::Order, kind) => {
                Ok(DomainEvent::Order(EntityEvent::decode(kind, frame)?))
            }
            EventName::Change(ResourceType::Payment, kind) => {
                Ok(DomainEvent::Payment(EntityEvent::decode(kind, frame)?))
            }
            EventName::Change(ResourceType::MenuItem, kind) => {
                Ok(DomainEvent::MenuItem(EntityEvent::decode(kind, frame)?))
            }
            EventName::Change(ResourceType::Outlet, kind) => {
                Ok(DomainEvent::Outlet(EntityEvent::decode(kind, frame)?))
            }
        }
    }

    pub fn resource(&self) -> Option<ResourceType> {
        match self {
            DomainEvent::Order(_) => Some(ResourceType::Order),
            DomainEvent::Payment(_) => Some(ResourceType::Payment),
            DomainEvent::MenuItem(_) => Some(ResourceType::MenuItem),
            DomainEvent::Outlet(_) => Some(ResourceType::Outlet),
            DomainEvent::SnapshotRequired(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    fn order_payload(status: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": "ord-1",
            "outlet": { "_id": "outlet-1" },
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:05:00Z",
            "status": status
        })
    }

    #[test]
    fn test_event_name_round_trip() {
        for name in [
            "ORDER_CREATED",
            "ORDER_STATUS_CHANGED",
            "PAYMENT_UPDATED",
            "MENU_ITEM_DELETED",
            "OUTLET_UPDATED",
            "SNAPSHOT_REQUIRED",
        ] {
            let parsed: EventName = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("ORDER_TELEPORTED".parse::<EventName>().is_err());
        assert!("TABLE_UPDATED".parse::<EventName>().is_err());
    }

    #[test]
    fn test_decode_status_changed() {
        let frame = EventFrame::new("ORDER_STATUS_CHANGED", order_payload("preparing"))
            .with_sequence(5);

        let DomainEvent::Order(event) = DomainEvent::decode(frame).unwrap() else {
            panic!("expected order event");
        };
        assert_eq!(event.kind, ChangeKind::StatusChanged);
        assert_eq!(event.sequence_id, Some(5));
        assert_eq!(event.outlet_id(), "outlet-1");
        match event.change {
            EntityChange::Upsert(order) => assert_eq!(order.status, OrderStatus::Preparing),
            EntityChange::Delete(_) => panic!("expected upsert"),
        }
    }

    #[test]
    fn test_decode_delete_uses_tombstone() {
        let frame = EventFrame::new(
            "MENU_ITEM_DELETED",
            serde_json::json!({ "id": "mi-1", "outletId": "outlet-1", "sequenceId": 9 }),
        );

        let DomainEvent::MenuItem(event) = DomainEvent::decode(frame).unwrap() else {
            panic!("expected menu item event");
        };
        assert_eq!(event.entity_id(), "mi-1");
        assert_eq!(event.sequence_id, Some(9));
    }

    #[test]
    fn test_decode_accepts_both_id_spellings() {
        let mut payload = order_payload("ready");
        payload["id"] = "ord-1".into();
        payload["outletId"] = "outlet-1".into();
        let frame = EventFrame::new("ORDER_UPDATED", payload).with_sequence(6);

        let DomainEvent::Order(event) = DomainEvent::decode(frame).unwrap() else {
            panic!("expected order event");
        };
        assert_eq!(event.entity_id(), "ord-1");
        assert_eq!(event.outlet_id(), "outlet-1");

        let tombstone = EventFrame::new(
            "PAYMENT_DELETED",
            serde_json::json!({ "_id": "pay-1", "id": "pay-1", "outlet": "outlet-1" }),
        );
        let DomainEvent::Payment(event) = DomainEvent::decode(tombstone).unwrap() else {
            panic!("expected payment event");
        };
        assert_eq!(event.entity_id(), "pay-1");
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let frame = EventFrame::new("ORDER_UPDATED", serde_json::json!({ "id": "ord-1" }));
        let err = DomainEvent::decode(frame).unwrap_err();
        assert!(matches!(err, ModelError::InvalidPayload { .. }));
    }

    #[test]
    fn test_snapshot_required_without_payload() {
        let frame = EventFrame::new(SNAPSHOT_REQUIRED, serde_json::Value::Null);
        let event = DomainEvent::decode(frame).unwrap();
        assert_eq!(
            event,
            DomainEvent::SnapshotRequired(SnapshotRequest::default())
        );
    }

    #[test]
    fn test_lifecycle_frames() {
        let frame = EventFrame::from_json(
            r#"{"event":"connect_error","payload":{"message":"jwt expired"}}"#,
        )
        .unwrap();
        assert_eq!(
            frame.lifecycle(),
            Some(LifecycleSignal::ConnectError {
                message: Some("jwt expired".to_string())
            })
        );
        assert_eq!(
            EventFrame::new("ORDER_CREATED", serde_json::Value::Null).lifecycle(),
            None
        );
    }
}
