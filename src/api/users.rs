use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::{AppState, CurrentActor, PageParams};
use crate::domain::aggregates::{Address, User};
use crate::service::{NewUser, PaginatedResponse, ProfileChanges, UserFilter};
use crate::Result;

pub async fn register(State(s): State<AppState>, Json(r): Json<NewUser>) -> Result<(StatusCode, Json<User>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.register(r).await?)))
}

pub async fn me(CurrentActor(actor): CurrentActor) -> Json<User> { Json(actor.user) }

pub async fn list_users(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Query(f): Query<UserFilter>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<User>>> {
    Ok(Json(s.marketplace.list_users(&actor, f, p.into()).await?))
}

pub async fn get_user(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.get_user(&actor, id).await?))
}

pub async fn update_profile(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<ProfileChanges>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.update_profile(&actor, id, r).await?))
}

pub async fn delete_user(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.marketplace.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block_user(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.set_user_blocked(&actor, id, true).await?))
}

pub async fn unblock_user(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.set_user_blocked(&actor, id, false).await?))
}

pub async fn add_address(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<Address>) -> Result<(StatusCode, Json<User>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.add_address(&actor, id, r).await?)))
}

pub async fn remove_address(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path((id, address_id)): Path<(Uuid, Uuid)>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.remove_address(&actor, id, address_id).await?))
}

pub async fn set_default_address(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path((id, address_id)): Path<(Uuid, Uuid)>) -> Result<Json<User>> {
    Ok(Json(s.marketplace.set_default_address(&actor, id, address_id).await?))
}
