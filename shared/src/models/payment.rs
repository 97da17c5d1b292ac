//! Payment Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Reference, either, either_ref};
use crate::error::ModelResult;
use crate::resource::{Entity, ResourceType, WireRecord};

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    Failed,
    Refunded,
}

/// Payment entity (normalized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub outlet_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    /// Order reference (String ID)
    pub order_id: String,
    /// Amount in currency unit
    pub amount: Decimal,
    pub currency: Option<String>,
    pub method: String,
    pub status: PaymentStatus,
    pub reference: Option<String>,
}

/// Payment as sent by the server
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
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
    #[serde(default)]
    pub order_id: Option<Reference>,
    #[serde(default)]
    pub order: Option<Reference>,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

impl WireRecord for PaymentRecord {
    type Entity = Payment;

    fn normalize(self) -> ModelResult<Payment> {
        Ok(Payment {
            id: either("id", self.id, self.object_id)?,
            outlet_id: either_ref("outletId", self.outlet_id, self.outlet)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            sequence_id: self.sequence_id,
            order_id: either_ref("orderId", self.order_id, self.order)?,
            amount: self.amount,
            currency: self.currency,
            method: self.method,
            status: self.status,
            reference: self.reference,
        })
    }
}

impl Entity for Payment {
    type Record = PaymentRecord;

    const RESOURCE: ResourceType = ResourceType::Payment;

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
    fn test_normalize_populated_order() {
        let json = serde_json::json!({
            "_id": "pay-1",
            "outletId": "outlet-1",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:01:00Z",
            "order": { "_id": "ord-1", "status": "pending" },
            "amount": 12.5,
            "method": "card",
            "status": "paid"
        });

        let payment = serde_json::from_value::<PaymentRecord>(json)
            .unwrap()
            .normalize()
            .unwrap();
        assert_eq!(payment.order_id, "ord-1");
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert_eq!(payment.amount, Decimal::new(125, 1));
    }
}
