use serde::Deserialize;
use uuid::Uuid;

use crate::domain::aggregates::{Payment, PaymentMethod, TransactionStatus};
use crate::service::{Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<TransactionStatus>,
    pub method: Option<PaymentMethod>,
    pub order: Option<Uuid>,
}

impl Marketplace {
    /// Admins list every transaction; everyone else only their own. Newest first.
    pub async fn list_payments(&self, actor: &Actor, filter: PaymentFilter, page: PageRequest) -> Result<PaginatedResponse<Payment>> {
        let (admin, me) = (actor.is_admin(), actor.id());
        let mut payments = self.storage.list_where::<Payment>(|p| {
            (admin || p.customer_id == me)
                && filter.status.map_or(true, |s| p.status == s)
                && filter.method.map_or(true, |m| p.method == m)
                && filter.order.map_or(true, |o| p.order_id == o)
        }).await?;
        payments.reverse();
        Ok(PaginatedResponse::paginate(payments, page))
    }
}
