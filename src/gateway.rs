//! Payment gateway seam.
//!
//! Only a simulated gateway exists: it waits, then approves the charge unless
//! it is above the configured decline limit.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::PaymentSettings;
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved { transaction_ref: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, payment_id: Uuid, amount: &Money) -> ChargeOutcome;
}

pub struct SimulatedGateway {
    settings: PaymentSettings,
}

impl SimulatedGateway {
    pub fn new(settings: PaymentSettings) -> Self { Self { settings } }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, payment_id: Uuid, amount: &Money) -> ChargeOutcome {
        if !self.settings.delay.is_zero() {
            tokio::time::sleep(self.settings.delay).await;
        }
        if amount.amount() <= Decimal::ZERO {
            return ChargeOutcome::Declined { reason: "amount must be positive".into() };
        }
        if let Some(limit) = self.settings.decline_above {
            if amount.amount() > limit {
                return ChargeOutcome::Declined { reason: format!("amount exceeds limit of {limit} {}", amount.currency()) };
            }
        }
        ChargeOutcome::Approved { transaction_ref: format!("SIM-{}", payment_id.simple()) }
    }
}
