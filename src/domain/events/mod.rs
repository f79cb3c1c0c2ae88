//! Domain events
use crate::domain::aggregates::{OrderStatus, StoreStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Store(StoreEvent),
}

impl DomainEvent {
    /// NATS subject the event is published under.
    pub fn subject(&self) -> String {
        let (aggregate, kind) = match self {
            Self::Product(e) => ("product", e.kind()),
            Self::Order(e) => ("order", e.kind()),
            Self::Store(e) => ("store", e.kind()),
        };
        format!("ecommerce.{aggregate}.{kind}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: Uuid, store_id: Uuid },
    Published { product_id: Uuid },
    Archived { product_id: Uuid },
    StockAdjusted { product_id: Uuid, variant_id: Option<Uuid>, stock: u32 },
}

impl ProductEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Published { .. } => "published",
            Self::Archived { .. } => "archived",
            Self::StockAdjusted { .. } => "stock_adjusted",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, customer_id: Uuid, total: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    PaymentSucceeded { order_id: Uuid, payment_id: Uuid },
    PaymentFailed { order_id: Uuid, payment_id: Uuid, reason: String },
}

impl OrderEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::PaymentSucceeded { .. } => "payment_succeeded",
            Self::PaymentFailed { .. } => "payment_failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    StatusChanged { store_id: Uuid, from: StoreStatus, to: StoreStatus },
}

impl StoreEvent {
    fn kind(&self) -> &'static str {
        match self { Self::StatusChanged { .. } => "status_changed" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject() {
        let e = DomainEvent::Order(OrderEvent::StatusChanged { order_id: Uuid::nil(), from: OrderStatus::Pending, to: OrderStatus::Confirmed });
        assert_eq!(e.subject(), "ecommerce.order.status_changed");
    }
}
