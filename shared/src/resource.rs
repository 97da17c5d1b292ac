//! Resource taxonomy and the entity contract shared by all four stores

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelResult;

/// The four resource types kept in sync on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceType {
    Order,
    Payment,
    MenuItem,
    Outlet,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Order,
        ResourceType::Payment,
        ResourceType::MenuItem,
        ResourceType::Outlet,
    ];

    /// REST path segment (`/sync/<segment>`, `/<segment>/outlet/<id>`)
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Payment => "payment",
            Self::MenuItem => "menu-item",
            Self::Outlet => "outlet",
        }
    }

    /// Key holding the entity array in REST envelopes
    pub fn collection_key(self) -> &'static str {
        match self {
            Self::Order => "orders",
            Self::Payment => "payments",
            Self::MenuItem => "menuItems",
            Self::Outlet => "outlets",
        }
    }

    /// Prefix of realtime event names (`ORDER_CREATED`, `MENU_ITEM_UPDATED`)
    pub fn event_prefix(self) -> &'static str {
        match self {
            Self::Order => "ORDER",
            Self::Payment => "PAYMENT",
            Self::MenuItem => "MENU_ITEM",
            Self::Outlet => "OUTLET",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Payment => write!(f, "payment"),
            Self::MenuItem => write!(f, "menu_item"),
            Self::Outlet => write!(f, "outlet"),
        }
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" | "orders" => Ok(Self::Order),
            "payment" | "payments" => Ok(Self::Payment),
            "menuItem" | "menu_item" | "menu-item" | "menuItems" => Ok(Self::MenuItem),
            "outlet" | "outlets" => Ok(Self::Outlet),
            other => Err(format!("unknown resource type: {other}")),
        }
    }
}

/// Normalized entity stored in a resource store.
///
/// Every reference field is a bare id string; raw server shapes never
/// implement this trait.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Raw wire shape this entity is normalized from
    type Record: WireRecord<Entity = Self>;

    const RESOURCE: ResourceType;

    fn id(&self) -> &str;
    fn outlet_id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn sequence_id(&self) -> Option<u64>;
}

/// Raw server shape of an entity.
///
/// `normalize` is the single adapter boundary between wire JSON and the
/// merge path. It is deterministic and has no side effects. Fields the
/// server sends under two names (`_id` and `id`, a populated `outlet` and
/// `outletId`) are resolved here, so both may be present on the wire.
pub trait WireRecord: DeserializeOwned + Send + 'static {
    type Entity: Entity<Record = Self>;

    fn normalize(self) -> ModelResult<Self::Entity>;
}
