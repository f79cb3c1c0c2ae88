//! Payment record kept for every checkout, whatever the method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::order::PaymentMethod;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub transaction_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus { #[default] Pending, Succeeded, Failed, Refunded }

impl Payment {
    pub fn open(order_id: Uuid, customer_id: Uuid, amount: Money, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), order_id, customer_id, amount, method, status: TransactionStatus::Pending,
            transaction_ref: None, failure_reason: None, created_at: now, updated_at: now,
        }
    }

    pub fn succeed(&mut self, transaction_ref: impl Into<String>) {
        self.status = TransactionStatus::Succeeded;
        self.transaction_ref = Some(transaction_ref.into());
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TransactionStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn refund(&mut self) { self.status = TransactionStatus::Refunded; self.updated_at = Utc::now(); }
}
