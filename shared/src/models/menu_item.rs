//! Menu Item Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Reference, either, either_ref};
use crate::error::ModelResult;
use crate::resource::{Entity, ResourceType, WireRecord};

fn default_true() -> bool {
    true
}

/// Menu item entity (normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub outlet_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    pub name: String,
    pub description: Option<String>,
    /// Category reference (String ID)
    pub category_id: Option<String>,
    /// Price in currency unit
    pub price: Decimal,
    pub is_available: bool,
    pub image_url: Option<String>,
}

/// Menu item as sent by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemRecord {
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
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Reference>,
    #[serde(default)]
    pub category: Option<Reference>,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl WireRecord for MenuItemRecord {
    type Entity = MenuItem;

    fn normalize(self) -> ModelResult<MenuItem> {
        Ok(MenuItem {
            id: either("id", self.id, self.object_id)?,
            outlet_id: either_ref("outletId", self.outlet_id, self.outlet)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sequence_id: self.sequence_id,
            name: self.name,
            description: self.description,
            category_id: self.category_id.or(self.category).map(Reference::into_id),
            price: self.price,
            is_available: self.is_available,
            image_url: self.image_url,
        })
    }
}

impl Entity for MenuItem {
    type Record = MenuItemRecord;

    const RESOURCE: ResourceType = ResourceType::MenuItem;

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
