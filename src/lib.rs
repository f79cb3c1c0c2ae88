//! OpenSASE Marketplace
//!
//! Self-hosted multi-vendor marketplace: storefront, seller dashboards and an
//! admin back-office served as a JSON API.
//!
//! ## Features
//! - Users with embedded address books
//! - Seller stores with admin approval
//! - Product catalog with priced, stocked variants
//! - Shopping cart priced live against the catalog
//! - Checkout with a simulated payment gateway
//! - Order lifecycle with payment-aware status transitions
//! - Verified-purchase reviews

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod events;
pub mod gateway;
pub mod pricing;
pub mod service;
pub mod storage;

use crate::domain::aggregates::{CartError, OrderError, ProductError, StoreTransitionError};
use crate::domain::value_objects::{MoneyError, SkuError};
use crate::storage::StorageError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Missing or unknown x-user-id header")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient inventory")]
    InsufficientInventory,

    #[error("Invalid quantity: must be between 1 and {max}")]
    InvalidQuantity { max: u32 },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart has unavailable items: {}", .0.join("; "))]
    CartUnavailable(Vec<String>),

    #[error("A shipping address is required")]
    AddressRequired,

    #[error("{0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl From<StorageError> for EcommerceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => EcommerceError::NotFound("Document"),
            other => EcommerceError::StorageError(other.to_string()),
        }
    }
}

impl From<ProductError> for EcommerceError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::InsufficientInventory => EcommerceError::InsufficientInventory,
            ProductError::VariantNotFound => EcommerceError::NotFound("Variant"),
            ProductError::DuplicateVariantSku => EcommerceError::Conflict(e.to_string()),
            ProductError::MissingName | ProductError::InvalidPrice => EcommerceError::Validation(e.to_string()),
        }
    }
}

impl From<OrderError> for EcommerceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => EcommerceError::EmptyCart,
            other => EcommerceError::InvalidTransition(other.to_string()),
        }
    }
}

impl From<StoreTransitionError> for EcommerceError {
    fn from(e: StoreTransitionError) -> Self { EcommerceError::InvalidTransition(e.to_string()) }
}

impl From<CartError> for EcommerceError {
    fn from(_: CartError) -> Self { EcommerceError::NotFound("Cart item") }
}

impl From<SkuError> for EcommerceError {
    fn from(e: SkuError) -> Self { EcommerceError::Validation(e.to_string()) }
}

impl From<MoneyError> for EcommerceError {
    fn from(e: MoneyError) -> Self { EcommerceError::Validation(e.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(e: validator::ValidationErrors) -> Self { EcommerceError::Validation(e.to_string()) }
}
