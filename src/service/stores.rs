use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Role, Store, StoreStatus};
use crate::domain::value_objects::slugify;
use crate::service::{contains_ci, non_blank, Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct NewStore {
    #[validate(length(min = 2, max = 80))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct StoreChanges {
    #[validate(length(min = 2, max = 80))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreFilter {
    pub status: Option<StoreStatus>,
    pub search: Option<String>,
}

impl Marketplace {
    pub async fn apply_for_store(&self, actor: &Actor, req: NewStore) -> Result<Store> {
        actor.require_role(Role::Seller)?;
        req.validate()?;
        if self.store_of(actor.id()).await?.is_some() {
            return Err(EcommerceError::Conflict("seller already has a store".into()));
        }
        let mut store = Store::apply(actor.id(), req.name.trim(), non_blank(req.description));
        store.logo_url = non_blank(req.logo_url);
        self.ensure_store_slug_free(&store.slug, None).await?;
        self.storage.save(&store).await?;
        info!(store_id = %store.id, owner = %actor.id(), "store application received");
        Ok(store)
    }

    /// Unapproved stores are visible only to their owner and admins.
    pub async fn get_store(&self, actor: Option<&Actor>, store_id: Uuid) -> Result<Store> {
        let store = self.load_store(store_id).await?;
        let privileged = actor.is_some_and(|a| a.is_admin() || a.id() == store.owner_id);
        if store.is_approved() || privileged { Ok(store) } else { Err(EcommerceError::NotFound("Store")) }
    }

    pub async fn my_store(&self, actor: &Actor) -> Result<Store> {
        self.store_of(actor.id()).await?.ok_or(EcommerceError::NotFound("Store"))
    }

    pub async fn list_stores(&self, actor: Option<&Actor>, filter: StoreFilter, page: PageRequest) -> Result<PaginatedResponse<Store>> {
        let admin = actor.is_some_and(Actor::is_admin);
        let status = if admin { filter.status } else { Some(StoreStatus::Approved) };
        let search = non_blank(filter.search);
        let stores = self.storage.list_where::<Store>(|s| {
            status.map_or(true, |st| s.status == st)
                && search.as_deref().map_or(true, |q| contains_ci(&s.name, q))
        }).await?;
        Ok(PaginatedResponse::paginate(stores, page))
    }

    pub async fn update_store(&self, actor: &Actor, store_id: Uuid, changes: StoreChanges) -> Result<Store> {
        changes.validate()?;
        let mut store = self.load_store(store_id).await?;
        actor.require_self_or_admin(store.owner_id)?;
        if let Some(name) = non_blank(changes.name) {
            let slug = slugify(&name);
            self.ensure_store_slug_free(&slug, Some(store_id)).await?;
            store.name = name;
            store.slug = slug;
        }
        if changes.description.is_some() { store.description = non_blank(changes.description); }
        if changes.logo_url.is_some() { store.logo_url = non_blank(changes.logo_url); }
        store.updated_at = chrono::Utc::now();
        self.storage.update(&store).await?;
        Ok(store)
    }

    /// Admin moderation: approve, reject or suspend.
    pub async fn review_store(&self, actor: &Actor, store_id: Uuid, to: StoreStatus, note: Option<String>) -> Result<Store> {
        actor.require_admin()?;
        if to == StoreStatus::Pending {
            return Err(EcommerceError::Validation("stores return to pending only when their owner re-applies".into()));
        }
        self.move_store(actor, store_id, to, non_blank(note)).await
    }

    /// A rejected store's owner may apply again.
    pub async fn reapply_store(&self, actor: &Actor, store_id: Uuid) -> Result<Store> {
        let store = self.load_store(store_id).await?;
        if store.owner_id != actor.id() { return Err(EcommerceError::Forbidden("not your store".into())); }
        self.move_store(actor, store_id, StoreStatus::Pending, None).await
    }

    pub(crate) async fn move_store(&self, actor: &Actor, store_id: Uuid, to: StoreStatus, note: Option<String>) -> Result<Store> {
        let mut store = self.load_store(store_id).await?;
        let event = store.transition(to, note)?;
        self.storage.update(&store).await?;
        info!(store_id = %store_id, status = ?to, by = %actor.id(), "store status changed");
        self.publish(vec![event]).await;
        Ok(store)
    }

    pub(crate) async fn load_store(&self, store_id: Uuid) -> Result<Store> {
        self.storage.find(&store_id.to_string()).await?.ok_or(EcommerceError::NotFound("Store"))
    }

    pub(crate) async fn store_of(&self, owner_id: Uuid) -> Result<Option<Store>> {
        Ok(self.storage.list_where::<Store>(|s| s.owner_id == owner_id).await?.into_iter().next())
    }

    /// The seller's store, which must be approved to trade.
    pub(crate) async fn trading_store(&self, actor: &Actor) -> Result<Store> {
        actor.require_role(Role::Seller)?;
        let store = self.my_store(actor).await?;
        if !store.is_approved() { return Err(EcommerceError::Forbidden("store is not approved".into())); }
        Ok(store)
    }

    async fn ensure_store_slug_free(&self, slug: &str, except: Option<Uuid>) -> Result<()> {
        let taken = self.storage.list_where::<Store>(|s| s.slug == slug && Some(s.id) != except).await?;
        if taken.is_empty() { Ok(()) } else { Err(EcommerceError::Conflict("store name already taken".into())) }
    }
}
