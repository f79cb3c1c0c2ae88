use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{AppState, CurrentActor, NoteBody, PageParams};
use crate::domain::aggregates::{Order, OrderStatus, Payment};
use crate::service::{OrderFilter, PaginatedResponse, PaymentFilter};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct StatusUpdate { pub status: OrderStatus, pub note: Option<String> }

pub async fn list_orders(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Query(f): Query<OrderFilter>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<Order>>> {
    Ok(Json(s.marketplace.list_orders(&actor, f, p.into()).await?))
}

pub async fn get_order(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(s.marketplace.get_order(&actor, id).await?))
}

pub async fn transition_order(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<StatusUpdate>) -> Result<Json<Order>> {
    Ok(Json(s.marketplace.transition_order(&actor, id, r.status, r.note).await?))
}

/// The body is optional; its `note` becomes the cancellation reason.
pub async fn cancel_order(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, body: Option<Json<NoteBody>>) -> Result<Json<Order>> {
    let note = body.and_then(|Json(b)| b.note);
    Ok(Json(s.marketplace.cancel_order(&actor, id, note).await?))
}

pub async fn refund_order(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, body: Option<Json<NoteBody>>) -> Result<Json<Order>> {
    let note = body.and_then(|Json(b)| b.note);
    Ok(Json(s.marketplace.refund_order(&actor, id, note).await?))
}

pub async fn list_payments(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Query(f): Query<PaymentFilter>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<Payment>>> {
    Ok(Json(s.marketplace.list_payments(&actor, f, p.into()).await?))
}
