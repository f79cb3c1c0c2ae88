use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Category, Product, ProductChanges, ProductStatus, Store};
use crate::domain::value_objects::{slugify, Money, Sku};
use crate::service::{contains_ci, non_blank, Actor, Marketplace, PageRequest, PaginatedResponse};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryChanges {
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    #[validate]
    pub variants: Vec<NewVariant>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewVariant {
    #[validate(length(min = 1, max = 80))]
    pub label: String,
    pub sku: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: u32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct VariantChanges {
    #[validate(length(min = 1, max = 80))]
    pub label: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort { #[default] Newest, PriceAsc, PriceDesc, Rating }

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<Uuid>,
    pub store: Option<Uuid>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl Marketplace {
    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    pub async fn create_category(&self, actor: &Actor, req: NewCategory) -> Result<Category> {
        actor.require_admin()?;
        req.validate()?;
        if let Some(parent) = req.parent_id { self.load_category(parent).await?; }
        let mut category = Category::create(req.name.trim(), non_blank(req.description), req.parent_id);
        category.image_url = non_blank(req.image_url);
        self.ensure_category_slug_free(&category.slug, None).await?;
        self.storage.save(&category).await?;
        info!(category_id = %category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn update_category(&self, actor: &Actor, category_id: Uuid, changes: CategoryChanges) -> Result<Category> {
        actor.require_admin()?;
        changes.validate()?;
        let mut category = self.load_category(category_id).await?;
        if let Some(parent) = changes.parent_id {
            self.ensure_not_descendant(parent, category_id).await?;
            category.parent_id = Some(parent);
        }
        if let Some(name) = non_blank(changes.name) {
            self.ensure_category_slug_free(&slugify(&name), Some(category_id)).await?;
            category.rename(name);
        }
        if changes.description.is_some() { category.description = non_blank(changes.description); }
        if changes.image_url.is_some() { category.image_url = non_blank(changes.image_url); }
        category.updated_at = chrono::Utc::now();
        self.storage.update(&category).await?;
        Ok(category)
    }

    pub async fn delete_category(&self, actor: &Actor, category_id: Uuid) -> Result<()> {
        actor.require_admin()?;
        self.load_category(category_id).await?;
        let children = self.storage.list_where::<Category>(|c| c.parent_id == Some(category_id)).await?;
        if !children.is_empty() { return Err(EcommerceError::Conflict("category has sub-categories".into())); }
        let products = self.storage.list_where::<Product>(|p| p.category_id() == Some(category_id)).await?;
        if !products.is_empty() { return Err(EcommerceError::Conflict(format!("category is used by {} products", products.len()))); }
        self.storage.remove::<Category>(&category_id.to_string()).await?;
        info!(category_id = %category_id, "category deleted");
        Ok(())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.storage.list::<Category>().await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<Category> { self.load_category(category_id).await }

    async fn load_category(&self, category_id: Uuid) -> Result<Category> {
        self.storage.find(&category_id.to_string()).await?.ok_or(EcommerceError::NotFound("Category"))
    }

    /// Walks up from `parent`; reaching `category_id` would close a loop.
    async fn ensure_not_descendant(&self, parent: Uuid, category_id: Uuid) -> Result<()> {
        let mut next = Some(parent);
        while let Some(id) = next {
            if id == category_id {
                return Err(EcommerceError::Validation("a category cannot be nested under itself or its sub-categories".into()));
            }
            next = self.load_category(id).await?.parent_id;
        }
        Ok(())
    }

    async fn ensure_category_slug_free(&self, slug: &str, except: Option<Uuid>) -> Result<()> {
        let taken = self.storage.list_where::<Category>(|c| c.slug == slug && Some(c.id) != except).await?;
        if taken.is_empty() { Ok(()) } else { Err(EcommerceError::Conflict("category already exists".into())) }
    }

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    pub async fn create_product(&self, actor: &Actor, req: NewProduct) -> Result<Product> {
        req.validate()?;
        let store = self.trading_store(actor).await?;
        if let Some(category) = req.category_id { self.load_category(category).await?; }
        let mut product = Product::create(store.id, Sku::new(req.sku)?, req.name.trim(), self.money(req.price))?;
        product.apply_changes(ProductChanges {
            description: req.description,
            category_id: req.category_id,
            compare_at_price: req.compare_at_price.map(|p| self.money(p)),
            tags: Some(req.tags),
            images: Some(req.images),
            ..Default::default()
        })?;
        if req.variants.is_empty() {
            product.set_stock(None, req.stock)?;
        }
        for v in req.variants {
            product.add_variant(v.label.trim(), Sku::new(v.sku)?, self.money(v.price), v.compare_at_price.map(|p| self.money(p)), v.stock)?;
        }
        self.storage.save(&product).await?;
        info!(product_id = %product.id(), store_id = %store.id, "product created");
        let events = product.take_events();
        self.publish(events).await;
        Ok(product)
    }

    /// Drafts, archived products and products of unapproved stores are visible
    /// only to the store owner and admins.
    pub async fn get_product(&self, actor: Option<&Actor>, product_id: Uuid) -> Result<Product> {
        let product = self.load_product(product_id).await?;
        if let Some(actor) = actor {
            if self.can_manage(actor, &product).await? { return Ok(product); }
        }
        let store = self.load_store(product.store_id()).await?;
        if product.is_active() && store.is_approved() { Ok(product) } else { Err(EcommerceError::NotFound("Product")) }
    }

    pub async fn list_products(&self, actor: Option<&Actor>, filter: ProductFilter, page: PageRequest) -> Result<PaginatedResponse<Product>> {
        let admin = actor.is_some_and(Actor::is_admin);
        let own_store = match (actor, filter.store) {
            (Some(actor), Some(store_id)) => self.load_store(store_id).await.ok().filter(|s| s.owner_id == actor.id()).map(|s| s.id),
            _ => None,
        };
        let privileged = admin || own_store.is_some();
        let approved: HashSet<Uuid> = self.storage.list_where::<Store>(Store::is_approved).await?.into_iter().map(|s| s.id).collect();
        let search = non_blank(filter.search);

        let mut products = self.storage.list_where::<Product>(|p| {
            let visible = if privileged {
                filter.status.map_or(true, |s| p.status() == s)
            } else {
                p.is_active() && approved.contains(&p.store_id())
            };
            let price = p.display_price().amount();
            visible
                && filter.category.map_or(true, |c| p.category_id() == Some(c))
                && filter.store.map_or(true, |s| p.store_id() == s)
                && filter.min_price.map_or(true, |min| price >= min)
                && filter.max_price.map_or(true, |max| price <= max)
                && filter.in_stock.map_or(true, |wanted| p.is_in_stock() == wanted)
                && search.as_deref().map_or(true, |q| {
                    contains_ci(p.name(), q) || contains_ci(p.description(), q) || p.tags().iter().any(|t| contains_ci(t, q))
                })
        }).await?;

        match filter.sort {
            ProductSort::Newest => products.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
            ProductSort::PriceAsc => products.sort_by_key(|p| p.display_price().amount()),
            ProductSort::PriceDesc => products.sort_by(|a, b| b.display_price().amount().cmp(&a.display_price().amount())),
            ProductSort::Rating => products.sort_by(|a, b| b.rating().average.cmp(&a.rating().average).then(b.rating().count.cmp(&a.rating().count))),
        }
        Ok(PaginatedResponse::paginate(products, page))
    }

    pub async fn update_product(&self, actor: &Actor, product_id: Uuid, update: ProductUpdate) -> Result<Product> {
        update.validate()?;
        if let Some(category) = update.category_id { self.load_category(category).await?; }
        self.modify_product(actor, product_id, |product, m| {
            product.apply_changes(ProductChanges {
                name: update.name,
                description: update.description,
                category_id: update.category_id,
                price: update.price.map(|p| m.money(p)),
                compare_at_price: update.compare_at_price.map(|p| m.money(p)),
                tags: update.tags,
                images: update.images,
            })?;
            Ok(())
        }).await
    }

    pub async fn publish_product(&self, actor: &Actor, product_id: Uuid) -> Result<Product> {
        self.modify_product(actor, product_id, |product, _| Ok(product.publish()?)).await
    }

    pub async fn archive_product(&self, actor: &Actor, product_id: Uuid) -> Result<Product> {
        self.modify_product(actor, product_id, |product, _| { product.archive(); Ok(()) }).await
    }

    pub async fn delete_product(&self, actor: &Actor, product_id: Uuid) -> Result<()> {
        let product = self.load_product(product_id).await?;
        if !self.can_manage(actor, &product).await? { return Err(EcommerceError::Forbidden("not your product".into())); }
        self.storage.remove::<Product>(&product_id.to_string()).await?;
        info!(product_id = %product_id, by = %actor.id(), "product deleted");
        Ok(())
    }

    pub async fn add_variant(&self, actor: &Actor, product_id: Uuid, req: NewVariant) -> Result<Product> {
        req.validate()?;
        let sku = Sku::new(req.sku)?;
        self.modify_product(actor, product_id, |product, m| {
            product.add_variant(req.label.trim(), sku, m.money(req.price), req.compare_at_price.map(|p| m.money(p)), req.stock)?;
            Ok(())
        }).await
    }

    pub async fn update_variant(&self, actor: &Actor, product_id: Uuid, variant_id: Uuid, changes: VariantChanges) -> Result<Product> {
        changes.validate()?;
        self.modify_product(actor, product_id, |product, m| {
            product.update_variant(variant_id, non_blank(changes.label), changes.price.map(|p| m.money(p)), changes.compare_at_price.map(|p| m.money(p)))?;
            Ok(())
        }).await
    }

    pub async fn remove_variant(&self, actor: &Actor, product_id: Uuid, variant_id: Uuid) -> Result<Product> {
        self.modify_product(actor, product_id, |product, _| Ok(product.remove_variant(variant_id)?)).await
    }

    /// Sets the on-hand stock of the product, or of one of its variants.
    pub async fn set_stock(&self, actor: &Actor, product_id: Uuid, variant_id: Option<Uuid>, stock: u32) -> Result<Product> {
        let _guard = self.inventory.lock().await;
        self.modify_product(actor, product_id, |product, _| Ok(product.set_stock(variant_id, stock)?)).await
    }

    async fn modify_product<F>(&self, actor: &Actor, product_id: Uuid, change: F) -> Result<Product>
    where
        F: FnOnce(&mut Product, &Self) -> Result<()>,
    {
        let mut product = self.load_product(product_id).await?;
        if !self.can_manage(actor, &product).await? { return Err(EcommerceError::Forbidden("not your product".into())); }
        change(&mut product, self)?;
        self.storage.update(&product).await?;
        let events = product.take_events();
        self.publish(events).await;
        Ok(product)
    }

    pub(crate) async fn load_product(&self, product_id: Uuid) -> Result<Product> {
        self.storage.find(&product_id.to_string()).await?.ok_or(EcommerceError::NotFound("Product"))
    }

    /// Admins manage every product; sellers only their own store's.
    async fn can_manage(&self, actor: &Actor, product: &Product) -> Result<bool> {
        if actor.is_admin() { return Ok(true); }
        Ok(self.store_of(actor.id()).await?.is_some_and(|s| s.id == product.store_id()))
    }

    /// Products a shopper may buy right now, keyed by id.
    pub(crate) async fn purchasable(&self, product_ids: &HashSet<Uuid>) -> Result<HashMap<Uuid, Product>> {
        let approved: HashSet<Uuid> = self.storage.list_where::<Store>(Store::is_approved).await?.into_iter().map(|s| s.id).collect();
        let mut catalog = HashMap::new();
        for id in product_ids {
            if let Some(product) = self.storage.find::<Product>(&id.to_string()).await? {
                if product.is_active() && approved.contains(&product.store_id()) {
                    catalog.insert(*id, product);
                }
            }
        }
        Ok(catalog)
    }

    pub(crate) fn money(&self, amount: Decimal) -> Money { Money::new(amount, &self.pricing.currency) }
}
