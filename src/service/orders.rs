use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentStatus, Role, TransactionStatus};
use crate::service::{Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::{EcommerceError, Result};

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Admins only.
    pub customer: Option<Uuid>,
}

impl Marketplace {
    /// Admins see every order, sellers the orders holding their store's items,
    /// customers their own. Newest first.
    pub async fn list_orders(&self, actor: &Actor, filter: OrderFilter, page: PageRequest) -> Result<PaginatedResponse<Order>> {
        let store_id = match actor.role() {
            Role::Seller => self.store_of(actor.id()).await?.map(|s| s.id),
            _ => None,
        };
        let (admin, me) = (actor.is_admin(), actor.id());
        let mut orders = self.storage.list_where::<Order>(|o| {
            let visible = match (admin, store_id) {
                (true, _) => filter.customer.map_or(true, |c| o.customer_id() == c),
                (false, Some(store)) => o.contains_store(store),
                (false, None) => o.customer_id() == me,
            };
            visible
                && filter.status.map_or(true, |s| o.status() == s)
                && filter.payment_status.map_or(true, |s| o.payment_status() == s)
        }).await?;
        orders.reverse();
        Ok(PaginatedResponse::paginate(orders, page))
    }

    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.load_order(order_id).await?;
        if self.can_view(actor, &order).await? { Ok(order) } else { Err(EcommerceError::NotFound("Order")) }
    }

    /// Moves an order along its lifecycle.
    ///
    /// Sellers fulfil and cancel orders holding their items, customers cancel
    /// their own orders before they are packed, and only admins refund. If
    /// restocking or settling payments fails the order keeps its old status.
    pub async fn transition_order(&self, actor: &Actor, order_id: Uuid, to: OrderStatus, note: Option<String>) -> Result<Order> {
        let _guard = self.lock_order(order_id).await;
        let mut order = self.load_order(order_id).await?;
        self.authorize_transition(actor, &order, to).await?;
        let previous = order.clone();
        order.transition(to, Some(actor.id()), note)?;
        self.storage.update(&order).await?;

        if let Err(e) = self.apply_transition(&order).await {
            warn!(order_id = %order_id, ?to, error = %e, "order status change failed, reverting");
            if let Err(revert) = self.storage.update(&previous).await {
                error!(order_id = %order_id, error = %revert, "failed to revert order status");
            }
            return Err(e);
        }
        info!(order_id = %order_id, from = ?previous.status(), ?to, by = %actor.id(), "order status changed");
        let events = order.take_events();
        self.publish(events).await;
        Ok(order)
    }

    async fn apply_transition(&self, order: &Order) -> Result<()> {
        match order.status() {
            OrderStatus::Cancelled => self.restock(order.items()).await,
            OrderStatus::Refunded => self.settle_payments(order.id(), TransactionStatus::Succeeded, |p| p.refund()).await,
            OrderStatus::Delivered => {
                let reference = format!("COD-{}", order.id().simple());
                self.settle_payments(order.id(), TransactionStatus::Pending, |p| p.succeed(reference.clone())).await
            }
            _ => Ok(()),
        }
    }

    pub async fn cancel_order(&self, actor: &Actor, order_id: Uuid, reason: Option<String>) -> Result<Order> {
        self.transition_order(actor, order_id, OrderStatus::Cancelled, reason).await
    }

    pub async fn refund_order(&self, actor: &Actor, order_id: Uuid, note: Option<String>) -> Result<Order> {
        self.transition_order(actor, order_id, OrderStatus::Refunded, note).await
    }

    async fn authorize_transition(&self, actor: &Actor, order: &Order, to: OrderStatus) -> Result<()> {
        if actor.is_admin() { return Ok(()); }
        if !self.can_view(actor, order).await? { return Err(EcommerceError::NotFound("Order")); }
        let allowed = match actor.role() {
            Role::Seller => matches!(
                to,
                OrderStatus::Confirmed | OrderStatus::Packed | OrderStatus::Shipped | OrderStatus::Delivered | OrderStatus::Cancelled
            ),
            _ => to == OrderStatus::Cancelled && matches!(order.status(), OrderStatus::Pending | OrderStatus::Confirmed),
        };
        if allowed { Ok(()) } else { Err(EcommerceError::Forbidden(format!("cannot move order to {to:?}").to_lowercase())) }
    }

    async fn can_view(&self, actor: &Actor, order: &Order) -> Result<bool> {
        Ok(match actor.role() {
            Role::Admin => true,
            Role::Seller => self.store_of(actor.id()).await?.is_some_and(|s| order.contains_store(s.id)),
            Role::Customer => order.customer_id() == actor.id(),
        })
    }

    /// Applies `settle` to the order's payment records currently in `from`.
    async fn settle_payments<F>(&self, order_id: Uuid, from: TransactionStatus, settle: F) -> Result<()>
    where
        F: Fn(&mut Payment),
    {
        let payments = self.storage.list_where::<Payment>(|p| p.order_id == order_id && p.status == from).await?;
        for mut payment in payments {
            settle(&mut payment);
            self.storage.update(&payment).await?;
        }
        Ok(())
    }

    pub(crate) async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.storage.find(&order_id.to_string()).await?.ok_or(EcommerceError::NotFound("Order"))
    }
}
