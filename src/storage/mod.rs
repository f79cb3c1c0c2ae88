//! Document storage.
//!
//! Every marketplace document is kept as JSON under a `(collection, id)` key.
//! Backends only move bytes; [`StorageService`] adds typed access on top.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{Cart, Category, Order, Payment, Product, Review, Store, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self { StorageError::Backend(e.to_string()) }
}

/// Low-level interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
    async fn get_bytes(&self, collection: &str, id: &str) -> Result<Vec<u8>, StorageError>;

    async fn set_bytes(&self, collection: &str, id: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Returns whether something was deleted.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    async fn exists(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    /// All documents of a collection, oldest first.
    async fn list_bytes(&self, collection: &str) -> Result<Vec<Vec<u8>>, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection { Users, Stores, Categories, Products, Carts, Orders, Payments, Reviews }

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Stores => "stores",
            Collection::Categories => "categories",
            Collection::Products => "products",
            Collection::Carts => "carts",
            Collection::Orders => "orders",
            Collection::Payments => "payments",
            Collection::Reviews => "reviews",
        }
    }
}

/// A type stored as a document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    fn key(&self) -> String;
}

impl Document for User { const COLLECTION: Collection = Collection::Users; fn key(&self) -> String { self.id.to_string() } }
impl Document for Store { const COLLECTION: Collection = Collection::Stores; fn key(&self) -> String { self.id.to_string() } }
impl Document for Category { const COLLECTION: Collection = Collection::Categories; fn key(&self) -> String { self.id.to_string() } }
impl Document for Product { const COLLECTION: Collection = Collection::Products; fn key(&self) -> String { self.id().to_string() } }
impl Document for Cart { const COLLECTION: Collection = Collection::Carts; fn key(&self) -> String { self.session().to_string() } }
impl Document for Order { const COLLECTION: Collection = Collection::Orders; fn key(&self) -> String { self.id().to_string() } }
impl Document for Payment { const COLLECTION: Collection = Collection::Payments; fn key(&self) -> String { self.id.to_string() } }
impl Document for Review { const COLLECTION: Collection = Collection::Reviews; fn key(&self) -> String { self.id.to_string() } }

/// Typed operations over a storage backend.
pub struct StorageService {
    backend: Box<dyn StorageInterface>,
}

impl StorageService {
    pub fn new(backend: Box<dyn StorageInterface>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self { Self::new(Box::new(MemoryStorage::new())) }

    /// Creates or overwrites a document.
    pub async fn save<T: Document>(&self, doc: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(doc).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.set_bytes(T::COLLECTION.as_str(), &doc.key(), bytes).await
    }

    /// Overwrites a document that must already exist.
    pub async fn update<T: Document>(&self, doc: &T) -> Result<(), StorageError> {
        let key = doc.key();
        if !self.backend.exists(T::COLLECTION.as_str(), &key).await? {
            return Err(StorageError::NotFound);
        }
        self.save(doc).await
    }

    pub async fn load<T: Document>(&self, id: &str) -> Result<T, StorageError> {
        let bytes = self.backend.get_bytes(T::COLLECTION.as_str(), id).await?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Like [`load`](Self::load) but a missing document is `None`.
    pub async fn find<T: Document>(&self, id: &str) -> Result<Option<T>, StorageError> {
        match self.load(id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn remove<T: Document>(&self, id: &str) -> Result<bool, StorageError> {
        self.backend.delete(T::COLLECTION.as_str(), id).await
    }

    pub async fn list<T: Document>(&self) -> Result<Vec<T>, StorageError> {
        self.backend.list_bytes(T::COLLECTION.as_str()).await?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string())))
            .collect()
    }

    pub async fn list_where<T: Document>(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, StorageError> {
        Ok(self.list::<T>().await?.into_iter().filter(|doc| predicate(doc)).collect())
    }
}
