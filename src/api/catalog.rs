use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{AppState, CurrentActor, MaybeActor, PageParams};
use crate::domain::aggregates::{Category, Product, Review};
use crate::service::{
    CategoryChanges, NewCategory, NewProduct, NewReview, NewVariant, PaginatedResponse, ProductFilter, ProductUpdate, VariantChanges,
};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct StockUpdate { pub variant_id: Option<Uuid>, pub stock: u32 }

// Categories

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(s.marketplace.list_categories().await?))
}

pub async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Category>> {
    Ok(Json(s.marketplace.get_category(id).await?))
}

pub async fn create_category(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Json(r): Json<NewCategory>) -> Result<(StatusCode, Json<Category>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.create_category(&actor, r).await?)))
}

pub async fn update_category(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<CategoryChanges>) -> Result<Json<Category>> {
    Ok(Json(s.marketplace.update_category(&actor, id, r).await?))
}

pub async fn delete_category(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.marketplace.delete_category(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Products

pub async fn list_products(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Query(f): Query<ProductFilter>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<Product>>> {
    Ok(Json(s.marketplace.list_products(actor.as_ref(), f, p.into()).await?))
}

pub async fn get_product(State(s): State<AppState>, MaybeActor(actor): MaybeActor, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.get_product(actor.as_ref(), id).await?))
}

pub async fn create_product(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Json(r): Json<NewProduct>) -> Result<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.create_product(&actor, r).await?)))
}

pub async fn update_product(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<ProductUpdate>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.update_product(&actor, id, r).await?))
}

pub async fn delete_product(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.marketplace.delete_product(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_product(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.publish_product(&actor, id).await?))
}

pub async fn archive_product(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.archive_product(&actor, id).await?))
}

pub async fn set_stock(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<StockUpdate>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.set_stock(&actor, id, r.variant_id, r.stock).await?))
}

pub async fn add_variant(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<NewVariant>) -> Result<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.add_variant(&actor, id, r).await?)))
}

pub async fn update_variant(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path((id, variant_id)): Path<(Uuid, Uuid)>, Json(r): Json<VariantChanges>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.update_variant(&actor, id, variant_id, r).await?))
}

pub async fn remove_variant(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path((id, variant_id)): Path<(Uuid, Uuid)>) -> Result<Json<Product>> {
    Ok(Json(s.marketplace.remove_variant(&actor, id, variant_id).await?))
}

// Reviews

pub async fn list_reviews(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<PageParams>) -> Result<Json<PaginatedResponse<Review>>> {
    Ok(Json(s.marketplace.list_reviews(id, p.into()).await?))
}

pub async fn create_review(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>, Json(r): Json<NewReview>) -> Result<(StatusCode, Json<Review>)> {
    Ok((StatusCode::CREATED, Json(s.marketplace.create_review(&actor, id, r).await?)))
}

pub async fn delete_review(State(s): State<AppState>, CurrentActor(actor): CurrentActor, Path(id): Path<Uuid>) -> Result<StatusCode> {
    s.marketplace.delete_review(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
