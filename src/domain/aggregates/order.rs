//! Order Aggregate
//!
//! Orders move `pending → confirmed → packed → shipped → delivered`, may be
//! cancelled before they ship, and may be refunded once money has been taken.
//! Payment status travels with the order status: an order is only confirmed
//! once paid (cash-on-delivery excepted), delivery settles cash-on-delivery,
//! and a refund requires a settled payment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::user::Address;
use crate::domain::value_objects::Money;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    items: Vec<LineItem>,
    totals: OrderTotals,
    shipping_address: Address,
    cancellation_reason: Option<String>,
    history: Vec<StatusChange>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub store_id: Uuid,
    pub title: String,
    pub variant_label: Option<String>,
    pub sku: String,
    pub unit_price: Money,
    pub compare_at_price: Option<Money>,
    pub quantity: u32,
    pub total: Money,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals { pub subtotal: Money, pub savings: Money, pub shipping: Money, pub tax: Money, pub total: Money }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusChange { pub from: OrderStatus, pub to: OrderStatus, pub changed_by: Option<Uuid>, pub note: Option<String>, pub at: DateTime<Utc> }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Packed, Shipped, Delivered, Cancelled, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { #[default] Cod, Card }

impl OrderStatus {
    pub fn can_become(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Pending, Confirmed) | (Pending, Cancelled)
                | (Confirmed, Packed) | (Confirmed, Cancelled)
                | (Packed, Shipped) | (Packed, Cancelled)
                | (Shipped, Delivered)
                | (Delivered, Refunded)
                | (Cancelled, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool { self == OrderStatus::Refunded }
}

impl Order {
    pub fn place(
        order_number: impl Into<String>,
        customer_id: Uuid,
        shipping_address: Address,
        items: Vec<LineItem>,
        totals: OrderTotals,
        payment_method: PaymentMethod,
    ) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut order = Self {
            id, order_number: order_number.into(), customer_id, status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending, payment_method, items, totals, shipping_address,
            cancellation_reason: None, history: vec![], created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, customer_id, total: order.totals.total.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn totals(&self) -> &OrderTotals { &self.totals }
    pub fn total(&self) -> &Money { &self.totals.total }
    pub fn history(&self) -> &[StatusChange] { &self.history }
    pub fn cancellation_reason(&self) -> Option<&str> { self.cancellation_reason.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn contains_store(&self, store_id: Uuid) -> bool { self.items.iter().any(|i| i.store_id == store_id) }

    /// Moves the order to `to`, applying the payment side effects of the move.
    pub fn transition(&mut self, to: OrderStatus, changed_by: Option<Uuid>, note: Option<String>) -> Result<(), OrderError> {
        let from = self.status;
        if !from.can_become(to) { return Err(OrderError::InvalidTransition { from, to }); }
        match to {
            OrderStatus::Confirmed if self.payment_method != PaymentMethod::Cod && self.payment_status != PaymentStatus::Paid => {
                return Err(OrderError::PaymentRequired);
            }
            OrderStatus::Refunded if self.payment_status != PaymentStatus::Paid => return Err(OrderError::NotPaid),
            _ => {}
        }
        match to {
            OrderStatus::Delivered if self.payment_method == PaymentMethod::Cod => self.payment_status = PaymentStatus::Paid,
            OrderStatus::Refunded => self.payment_status = PaymentStatus::Refunded,
            OrderStatus::Cancelled => self.cancellation_reason = note.clone(),
            _ => {}
        }
        self.status = to;
        self.history.push(StatusChange { from, to, changed_by, note, at: Utc::now() });
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to }));
        Ok(())
    }

    pub fn mark_paid(&mut self, payment_id: Uuid) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Pending { return Err(OrderError::PaymentAlreadySettled); }
        self.payment_status = PaymentStatus::Paid;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentSucceeded { order_id: self.id, payment_id }));
        Ok(())
    }

    pub fn mark_payment_failed(&mut self, payment_id: Uuid, reason: impl Into<String>) -> Result<(), OrderError> {
        if self.payment_status != PaymentStatus::Pending { return Err(OrderError::PaymentAlreadySettled); }
        self.payment_status = PaymentStatus::Failed;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: self.id, payment_id, reason: reason.into() }));
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError { NoItems, InvalidTransition { from: OrderStatus, to: OrderStatus }, PaymentRequired, NotPaid, PaymentAlreadySettled }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No items"),
            Self::InvalidTransition { from, to } => write!(f, "Invalid status transition from {from:?} to {to:?}"),
            Self::PaymentRequired => write!(f, "Order must be paid before it is confirmed"),
            Self::NotPaid => write!(f, "Order has no settled payment to refund"),
            Self::PaymentAlreadySettled => write!(f, "Payment already settled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn usd(units: i64) -> Money { Money::usd(Decimal::new(units, 0)) }

    fn order(method: PaymentMethod) -> Order {
        let item = LineItem {
            product_id: Uuid::now_v7(), variant_id: None, store_id: Uuid::now_v7(), title: "Widget".into(), variant_label: None,
            sku: "W001".into(), unit_price: usd(10), compare_at_price: None, quantity: 2, total: usd(20),
        };
        let totals = OrderTotals { subtotal: usd(20), savings: usd(0), shipping: usd(5), tax: usd(0), total: usd(25) };
        Order::place("ORD-00001001", Uuid::now_v7(), Address::default(), vec![item], totals, method).unwrap()
    }

    #[test]
    fn test_order_workflow() {
        let mut order = order(PaymentMethod::Card);
        assert_eq!(order.transition(OrderStatus::Confirmed, None, None), Err(OrderError::PaymentRequired));
        order.mark_paid(Uuid::now_v7()).unwrap();
        order.transition(OrderStatus::Confirmed, None, None).unwrap();
        order.transition(OrderStatus::Packed, None, None).unwrap();
        order.transition(OrderStatus::Shipped, None, Some("AWB 123".into())).unwrap();
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert_eq!(
            order.transition(OrderStatus::Cancelled, None, None),
            Err(OrderError::InvalidTransition { from: OrderStatus::Shipped, to: OrderStatus::Cancelled })
        );
        order.transition(OrderStatus::Delivered, None, None).unwrap();
        order.transition(OrderStatus::Refunded, None, None).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert!(order.status().is_terminal());
        assert_eq!(order.history().len(), 5);
    }

    #[test]
    fn test_cod_settles_on_delivery() {
        let mut order = order(PaymentMethod::Cod);
        for to in [OrderStatus::Confirmed, OrderStatus::Packed, OrderStatus::Shipped] {
            order.transition(to, None, None).unwrap();
        }
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        order.transition(OrderStatus::Delivered, None, None).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_cancelled_unpaid_order_cannot_be_refunded() {
        let mut order = order(PaymentMethod::Cod);
        order.transition(OrderStatus::Cancelled, None, Some("changed my mind".into())).unwrap();
        assert_eq!(order.cancellation_reason(), Some("changed my mind"));
        assert_eq!(order.transition(OrderStatus::Refunded, None, None), Err(OrderError::NotPaid));
    }

    #[test]
    fn test_events_raised() {
        let mut order = order(PaymentMethod::Cod);
        order.transition(OrderStatus::Confirmed, None, None).unwrap();
        let events = order.take_events();
        assert_eq!(events.len(), 2);
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_place_requires_items() {
        let totals = OrderTotals { subtotal: usd(0), savings: usd(0), shipping: usd(0), tax: usd(0), total: usd(0) };
        let err = Order::place("ORD-1", Uuid::now_v7(), Address::default(), vec![], totals, PaymentMethod::Cod).unwrap_err();
        assert_eq!(err, OrderError::NoItems);
    }
}
