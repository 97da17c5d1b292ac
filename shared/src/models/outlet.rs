//! Outlet Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Reference, either};
use crate::error::ModelResult;
use crate::resource::{Entity, ResourceType, WireRecord};

/// Outlet entity (normalized)
///
/// An outlet is its own scope: `outlet_id` equals `id` unless the server
/// says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outlet {
    pub id: String,
    pub outlet_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    /// Vendor reference (String ID)
    pub vendor_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub is_open: bool,
    pub accepting_orders: bool,
}

/// Outlet as sent by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "_id")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub outlet_id: Option<Reference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sequence_id: Option<u64>,
    #[serde(default)]
    pub vendor_id: Option<Reference>,
    #[serde(default)]
    pub vendor: Option<Reference>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub accepting_orders: bool,
}

impl WireRecord for OutletRecord {
    type Entity = Outlet;

    fn normalize(self) -> ModelResult<Outlet> {
        let id = either("id", self.id, self.object_id)?;
        let outlet_id = self
            .outlet_id
            .map(Reference::into_id)
            .unwrap_or_else(|| id.clone());
        Ok(Outlet {
            id,
            outlet_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sequence_id: self.sequence_id,
            vendor_id: self.vendor_id.or(self.vendor).map(Reference::into_id),
            name: self.name,
            address: self.address,
            is_open: self.is_open,
            accepting_orders: self.accepting_orders,
        })
    }
}

impl Entity for Outlet {
    type Record = OutletRecord;

    const RESOURCE: ResourceType = ResourceType::Outlet;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outlet_scopes_itself() {
        let json = serde_json::json!({
            "_id": "outlet-9",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z",
            "vendor": { "_id": "vendor-1" },
            "name": "Harbour Kitchen",
            "isOpen": true
        });

        let outlet = serde_json::from_value::<OutletRecord>(json)
            .unwrap()
            .normalize()
            .unwrap();
        assert_eq!(outlet.outlet_id, "outlet-9");
        assert_eq!(outlet.vendor_id.as_deref(), Some("vendor-1"));
        assert!(outlet.is_open);
        assert!(!outlet.accepting_orders);
    }
}
