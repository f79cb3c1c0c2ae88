use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{AppState, CurrentActor, MaybeActor, PageParams};
use crate::domain::aggregates::{Store, StoreStatus};
use crate::service::{NewStore, PaginatedResponse, StoreChanges, StoreFilter};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct StoreDecision { pub status: StoreStatus, pub note: Option<String> }

pub async fn apply_for_store(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Json(r): Json<NewStore>) -> Result<(StatusCode, Json<Store>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.apply_for_store(&actor, r).await?)))
}

pub async fn list_stores(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Query(f): Query<StoreFilter>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<Store>>> {
    Ok(Json(s.marketplace.list_stores(actor.as_ref(), f, p.into()).await?))
}

pub async fn my_store(State(s): State<AppState>, CurrentActor(actor): CurrentActor) -> Result<Json<Store>> {
    Ok(Json(s.marketplace.my_store(&actor).await?))
}

pub async fn get_store(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path(id): Path<Uuid>) -> Result<Json<Store>> {
    Ok(Json(s.marketplace.get_store(actor.as_ref(), id).await?))
}

pub async fn update_store(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<StoreChanges>) -> Result<Json<Store>> {
    Ok(Json(s.marketplace.update_store(&actor, id, r).await?))
}

pub async fn review_store(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<StoreDecision>) -> Result<Json<Store>> {
    Ok(Json(s.marketplace.review_store(&actor, id, r.status, r.note).await?))
}

pub async fn reapply_store(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<Store>> {
    Ok(Json(s.marketplace.reapply_store(&actor, id).await?))
}
