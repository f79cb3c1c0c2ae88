//! HTTP surface: an axum router under `/api/v1` over a shared [`Marketplace`].

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::service::{Actor, Marketplace, PageRequest};
use crate::EcommerceError;

mod catalog;
mod orders;
mod shopping;
mod stores;
mod users;

/// Header carrying the id of the acting user.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub marketplace: Arc<Marketplace>,
}

impl AppState {
    pub fn new(marketplace: Marketplace) -> Self { Self { marketplace: Arc::new(marketplace) } }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-marketplace"})) }))
        // users
        .route("/api/v1/users", get(users::list_users).post(users::register))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/:id", get(users::get_user).put(users::update_profile).delete(users::delete_user))
        .route("/api/v1/users/:id/block", post(users::block_user))
        .route("/api/v1/users/:id/unblock", post(users::unblock_user))
        .route("/api/v1/users/:id/addresses", post(users::add_address))
        .route("/api/v1/users/:id/addresses/:address_id", delete(users::remove_address))
        .route("/api/v1/users/:id/addresses/:address_id/default", post(users::set_default_address))
        // stores
        .route("/api/v1/stores", get(stores::list_stores).post(stores::apply_for_store))
        .route("/api/v1/stores/mine", get(stores::my_store))
        .route("/api/v1/stores/:id", get(stores::get_store).put(stores::update_store))
        .route("/api/v1/stores/:id/review", post(stores::review_store))
        .route("/api/v1/stores/:id/reapply", post(stores::reapply_store))
        // catalog
        .route("/api/v1/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/api/v1/categories/:id", get(catalog::get_category).put(catalog::update_category).delete(catalog::delete_category))
        .route("/api/v1/products", get(catalog::list_products).post(catalog::create_product))
        .route("/api/v1/products/:id", get(catalog::get_product).put(catalog::update_product).delete(catalog::delete_product))
        .route("/api/v1/products/:id/publish", post(catalog::publish_product))
        .route("/api/v1/products/:id/archive", post(catalog::archive_product))
        .route("/api/v1/products/:id/stock", put(catalog::set_stock))
        .route("/api/v1/products/:id/variants", post(catalog::add_variant))
        .route("/api/v1/products/:id/variants/:variant_id", put(catalog::update_variant).delete(catalog::remove_variant))
        .route("/api/v1/products/:id/reviews", get(catalog::list_reviews).post(catalog::create_review))
        .route("/api/v1/reviews/:id", delete(catalog::delete_review))
        // cart & checkout
        .route("/api/v1/cart/:session", get(shopping::get_cart).delete(shopping::clear_cart))
        .route("/api/v1/cart/:session/items", post(shopping::add_to_cart))
        .route("/api/v1/cart/:session/items/:line_id", put(shopping::update_cart_line).delete(shopping::remove_cart_line))
        .route("/api/v1/checkout", post(shopping::checkout))
        // orders & payments
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/status", post(orders::transition_order))
        .route("/api/v1/orders/:id/cancel", post(orders::cancel_order))
        .route("/api/v1/orders/:id/refund", post(orders::refund_order))
        .route("/api/v1/payments", get(orders::list_payments))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams { pub page: Option<u32>, pub per_page: Option<u32> }

impl From<PageParams> for PageRequest {
    fn from(p: PageParams) -> Self { PageRequest::new(p.page, p.per_page) }
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteBody { pub note: Option<String> }

/// The user named by the `x-user-id` header. Rejects the request when the
/// header is missing, malformed, or names an unknown or blocked user.
pub struct CurrentActor(pub Actor);

/// Like [`CurrentActor`], but anonymous requests pass through as `None`.
pub struct MaybeActor(pub Option<Actor>);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = header_user_id(parts)?.ok_or(EcommerceError::Unauthenticated)?;
        Ok(Self(state.marketplace.authenticate(user_id).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match header_user_id(parts)? {
            Some(user_id) => Ok(Self(Some(state.marketplace.authenticate(user_id).await?))),
            None => Ok(Self(None)),
        }
    }
}

fn header_user_id(parts: &Parts) -> Result<Option<Uuid>, EcommerceError> {
    let Some(value) = parts.headers.get(USER_HEADER) else { return Ok(None) };
    value.to_str().ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or(EcommerceError::Unauthenticated)
}

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::InvalidQuantity { .. } | Self::EmptyCart | Self::AddressRequired => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::InsufficientInventory | Self::CartUnavailable(_) | Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "conflict",
            Self::InsufficientInventory => "insufficient_inventory",
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::EmptyCart => "empty_cart",
            Self::CartUnavailable(_) => "cart_unavailable",
            Self::AddressRequired => "address_required",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::StorageError(_) => "storage_error",
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.code(), "message": self.to_string()}))).into_response()
    }
}
