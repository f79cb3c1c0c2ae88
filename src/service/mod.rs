//! Marketplace operations.
//!
//! [`Marketplace`] owns storage, the event bus and the payment gateway. Its
//! operations are split by area across this module's files; each takes the
//! acting [`Actor`] where access depends on who is asking.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{Role, User};
use crate::domain::events::DomainEvent;
use crate::events::EventBus;
use crate::gateway::PaymentGateway;
use crate::pricing::PricingPolicy;
use crate::storage::StorageService;
use crate::{EcommerceError, Result};

mod carts;
mod catalog;
mod checkout;
mod orders;
mod payments;
mod reviews;
mod stores;
mod users;

pub use carts::AddToCart;
pub use catalog::{CategoryChanges, NewCategory, NewProduct, NewVariant, ProductFilter, ProductSort, ProductUpdate, VariantChanges};
pub use checkout::{CheckoutOutcome, CheckoutRequest};
pub use orders::OrderFilter;
pub use payments::PaymentFilter;
pub use reviews::NewReview;
pub use stores::{NewStore, StoreChanges, StoreFilter};
pub use users::{NewUser, ProfileChanges, UserFilter};

pub struct Marketplace {
    storage: StorageService,
    events: EventBus,
    gateway: Box<dyn PaymentGateway>,
    pricing: PricingPolicy,
    /// Serialises stock decrements and restocks.
    inventory: Mutex<()>,
    /// One lock per order with a status change in flight.
    order_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

/// The authenticated user a request acts as.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user: User,
}

impl Actor {
    pub fn id(&self) -> Uuid { self.user.id }
    pub fn role(&self) -> Role { self.user.role }
    pub fn is_admin(&self) -> bool { self.user.is_admin() }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() { Ok(()) } else { Err(EcommerceError::Forbidden("admin only".into())) }
    }

    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role() == role { Ok(()) } else { Err(EcommerceError::Forbidden(format!("{role:?} only").to_lowercase())) }
    }

    /// Admins may act on anyone's behalf.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<()> {
        if self.is_admin() || self.id() == user_id { Ok(()) } else { Err(EcommerceError::Forbidden("not your resource".into())) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest { pub page: u32, pub per_page: u32 }

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, 100) }
    }
}

impl Default for PageRequest {
    fn default() -> Self { Self::new(None, None) }
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: usize, pub page: u32, pub per_page: u32 }

impl<T> PaginatedResponse<T> {
    pub fn paginate(items: Vec<T>, page: PageRequest) -> Self {
        let total = items.len();
        let skip = (page.page as usize - 1) * page.per_page as usize;
        let data = items.into_iter().skip(skip).take(page.per_page as usize).collect();
        Self { data, total, page: page.page, per_page: page.per_page }
    }
}

impl Marketplace {
    pub fn new(storage: StorageService, events: EventBus, gateway: Box<dyn PaymentGateway>, pricing: PricingPolicy) -> Self {
        Self { storage, events, gateway, pricing, inventory: Mutex::new(()), order_locks: Mutex::new(HashMap::new()) }
    }

    /// Held while an order is read, moved and its side effects applied.
    async fn lock_order(&self, order_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.order_locks.lock().await;
            // entries nobody else holds are idle
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(order_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if !events.is_empty() { self.events.publish(events).await; }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::PaymentSettings;
    use crate::gateway::SimulatedGateway;
    use crate::storage::{Collection, MemoryStorage, StorageError, StorageInterface};

    fn instant() -> PaymentSettings { PaymentSettings { delay: Duration::ZERO, decline_above: None } }

    pub fn marketplace() -> Marketplace { marketplace_with(instant()) }

    pub fn marketplace_with(payment: PaymentSettings) -> Marketplace {
        Marketplace::new(StorageService::in_memory(), EventBus::default(), Box::new(SimulatedGateway::new(payment)), PricingPolicy::default())
    }

    /// A marketplace whose writes to one collection can be made to fail.
    pub fn marketplace_with_faults() -> (Marketplace, Faults) {
        let faults = Faults::default();
        let storage = FaultyStorage { inner: MemoryStorage::new(), faults: faults.clone() };
        let m = Marketplace::new(StorageService::new(Box::new(storage)), EventBus::default(), Box::new(SimulatedGateway::new(instant())), PricingPolicy::default());
        (m, faults)
    }

    #[derive(Clone, Default)]
    pub struct Faults(Arc<std::sync::Mutex<Option<Collection>>>);

    impl Faults {
        pub fn fail_writes(&self, collection: Collection) { *self.0.lock().unwrap() = Some(collection); }
        pub fn heal(&self) { *self.0.lock().unwrap() = None; }

        fn check(&self, collection: &str) -> std::result::Result<(), StorageError> {
            match *self.0.lock().unwrap() {
                Some(failing) if failing.as_str() == collection => Err(StorageError::Backend(format!("{collection} is read-only"))),
                _ => Ok(()),
            }
        }
    }

    struct FaultyStorage { inner: MemoryStorage, faults: Faults }

    #[async_trait]
    impl StorageInterface for FaultyStorage {
        async fn get_bytes(&self, collection: &str, id: &str) -> std::result::Result<Vec<u8>, StorageError> {
            self.inner.get_bytes(collection, id).await
        }

        async fn set_bytes(&self, collection: &str, id: &str, value: Vec<u8>) -> std::result::Result<(), StorageError> {
            self.faults.check(collection)?;
            self.inner.set_bytes(collection, id, value).await
        }

        async fn delete(&self, collection: &str, id: &str) -> std::result::Result<bool, StorageError> {
            self.faults.check(collection)?;
            self.inner.delete(collection, id).await
        }

        async fn exists(&self, collection: &str, id: &str) -> std::result::Result<bool, StorageError> {
            self.inner.exists(collection, id).await
        }

        async fn list_bytes(&self, collection: &str) -> std::result::Result<Vec<Vec<u8>>, StorageError> {
            self.inner.list_bytes(collection).await
        }
    }
}
