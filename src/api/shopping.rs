use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{AppState, CurrentActor, MaybeActor};
use crate::pricing::PricedCart;
use crate::service::{AddToCart, CheckoutOutcome, CheckoutRequest};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct LineQuantity { pub quantity: u32 }

pub async fn get_cart(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path(session): Path<String>) -> Result<Json<PricedCart>> {
    Ok(Json(s.marketplace.get_cart(actor.as_ref(), &session).await?))
}

pub async fn add_to_cart(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path(session): Path<String>, Json(r): Json<AddToCart>) -> Result<(StatusCode, Json<PricedCart>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.add_to_cart(actor.as_ref(), &session, r).await?)))
}

pub async fn update_cart_line(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path((session, line_id)): Path<(String, Uuid)>, Json(r): Json<LineQuantity>) -> Result<Json<PricedCart>> {
    Ok(Json(s.marketplace.update_cart_line(actor.as_ref(), &session, line_id, r.quantity).await?))
}

pub async fn remove_cart_line(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path((session, line_id)): Path<(String, Uuid)>) -> Result<Json<PricedCart>> {
    Ok(Json(s.marketplace.remove_cart_line(actor.as_ref(), &session, line_id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path(session): Path<String>) -> Result<StatusCode> {
    s.marketplace.clear_cart(actor.as_ref(), &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A declined card still creates the (cancelled) order, so the response is
/// `201` either way; the payment status tells the two apart.
pub async fn checkout(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Json(r): Json<CheckoutRequest>) -> Result<(StatusCode, Json<CheckoutOutcome>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.checkout(&actor, r).await?)))
}
