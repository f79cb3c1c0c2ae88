//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{slugify, Money, Quantity, Sku};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    store_id: Uuid,
    category_id: Option<Uuid>,
    sku: Sku,
    name: String,
    slug: String,
    description: String,
    price: Money,
    compare_at_price: Option<Money>,
    stock: Quantity,
    status: ProductStatus,
    tags: Vec<String>,
    images: Vec<String>,
    variants: Vec<Variant>,
    rating: RatingSummary,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variant { pub id: Uuid, pub label: String, pub sku: Sku, pub price: Money, pub compare_at_price: Option<Money>, pub stock: Quantity }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary { pub average: Decimal, pub count: u32 }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Draft, Active, Archived }

/// What a cart line or order line actually buys: the chosen variant, or the
/// product itself when it has none.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedVariant {
    pub variant_id: Option<Uuid>,
    pub label: Option<String>,
    pub sku: Sku,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock: Quantity,
}

/// Editable catalog fields. `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub price: Option<Money>,
    pub compare_at_price: Option<Money>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl Product {
    pub fn create(store_id: Uuid, sku: Sku, name: impl Into<String>, price: Money) -> Result<Self, ProductError> {
        let name = name.into();
        if name.trim().is_empty() { return Err(ProductError::MissingName); }
        if price.is_negative() { return Err(ProductError::InvalidPrice); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut product = Self {
            id, store_id, category_id: None, sku, slug: slugify(&name), name, description: String::new(),
            price, compare_at_price: None, stock: Quantity::default(), status: ProductStatus::Draft,
            tags: vec![], images: vec![], variants: vec![], rating: RatingSummary::default(),
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: id, store_id }));
        Ok(product)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn store_id(&self) -> Uuid { self.store_id }
    pub fn category_id(&self) -> Option<Uuid> { self.category_id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn slug(&self) -> &str { &self.slug }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> &Money { &self.price }
    pub fn stock(&self) -> Quantity { self.stock }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn tags(&self) -> &[String] { &self.tags }
    pub fn variants(&self) -> &[Variant] { &self.variants }
    pub fn rating(&self) -> &RatingSummary { &self.rating }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }
    pub fn has_variants(&self) -> bool { !self.variants.is_empty() }

    pub fn is_in_stock(&self) -> bool {
        if self.has_variants() { self.variants.iter().any(|v| !v.stock.is_zero()) } else { !self.stock.is_zero() }
    }

    /// Lowest price a shopper can pay for this product.
    pub fn display_price(&self) -> &Money {
        self.variants.iter().map(|v| &v.price).min_by_key(|p| p.amount()).unwrap_or(&self.price)
    }

    pub fn apply_changes(&mut self, changes: ProductChanges) -> Result<(), ProductError> {
        if let Some(name) = changes.name {
            if name.trim().is_empty() { return Err(ProductError::MissingName); }
            self.slug = slugify(&name);
            self.name = name;
        }
        if let Some(price) = changes.price {
            if price.is_negative() { return Err(ProductError::InvalidPrice); }
            self.price = price;
        }
        if let Some(description) = changes.description { self.description = description; }
        if changes.category_id.is_some() { self.category_id = changes.category_id; }
        if changes.compare_at_price.is_some() { self.compare_at_price = changes.compare_at_price; }
        if let Some(tags) = changes.tags { self.tags = tags; }
        if let Some(images) = changes.images { self.images = images; }
        self.touch();
        Ok(())
    }

    pub fn publish(&mut self) -> Result<(), ProductError> {
        if self.name.is_empty() { return Err(ProductError::MissingName); }
        if self.display_price().is_zero() { return Err(ProductError::InvalidPrice); }
        self.status = ProductStatus::Active;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Published { product_id: self.id }));
        Ok(())
    }

    pub fn archive(&mut self) {
        self.status = ProductStatus::Archived;
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::Archived { product_id: self.id }));
    }

    pub fn add_variant(&mut self, label: impl Into<String>, sku: Sku, price: Money, compare_at_price: Option<Money>, stock: u32) -> Result<Uuid, ProductError> {
        let label = label.into();
        if label.trim().is_empty() { return Err(ProductError::MissingName); }
        if price.is_negative() { return Err(ProductError::InvalidPrice); }
        if self.variants.iter().any(|v| v.sku == sku) { return Err(ProductError::DuplicateVariantSku); }
        let id = Uuid::now_v7();
        self.variants.push(Variant { id, label, sku, price, compare_at_price, stock: Quantity::new(stock) });
        self.touch();
        Ok(id)
    }

    pub fn update_variant(&mut self, variant_id: Uuid, label: Option<String>, price: Option<Money>, compare_at_price: Option<Money>) -> Result<(), ProductError> {
        if price.as_ref().is_some_and(Money::is_negative) { return Err(ProductError::InvalidPrice); }
        let variant = self.variants.iter_mut().find(|v| v.id == variant_id).ok_or(ProductError::VariantNotFound)?;
        if let Some(label) = label { variant.label = label; }
        if let Some(price) = price { variant.price = price; }
        if compare_at_price.is_some() { variant.compare_at_price = compare_at_price; }
        self.touch();
        Ok(())
    }

    pub fn remove_variant(&mut self, variant_id: Uuid) -> Result<(), ProductError> {
        let before = self.variants.len();
        self.variants.retain(|v| v.id != variant_id);
        if self.variants.len() == before { return Err(ProductError::VariantNotFound); }
        self.touch();
        Ok(())
    }

    /// Picks what `variant_id` refers to. With no id, a product with variants
    /// falls back to its first in-stock variant, then to its first variant.
    pub fn resolve(&self, variant_id: Option<Uuid>) -> Result<ResolvedVariant, ProductError> {
        let variant = match variant_id {
            Some(id) => Some(self.variants.iter().find(|v| v.id == id).ok_or(ProductError::VariantNotFound)?),
            None => self.variants.iter().find(|v| !v.stock.is_zero()).or_else(|| self.variants.first()),
        };
        Ok(match variant {
            Some(v) => ResolvedVariant {
                variant_id: Some(v.id), label: Some(v.label.clone()), sku: v.sku.clone(),
                price: v.price.clone(), compare_at_price: v.compare_at_price.clone(), stock: v.stock,
            },
            None => ResolvedVariant {
                variant_id: None, label: None, sku: self.sku.clone(),
                price: self.price.clone(), compare_at_price: self.compare_at_price.clone(), stock: self.stock,
            },
        })
    }

    pub fn set_stock(&mut self, variant_id: Option<Uuid>, stock: u32) -> Result<(), ProductError> {
        *self.stock_slot(variant_id)? = Quantity::new(stock);
        self.stock_changed(variant_id, stock);
        Ok(())
    }

    pub fn add_inventory(&mut self, variant_id: Option<Uuid>, qty: u32) -> Result<(), ProductError> {
        let slot = self.stock_slot(variant_id)?;
        *slot = slot.add(qty);
        let stock = slot.value();
        self.stock_changed(variant_id, stock);
        Ok(())
    }

    pub fn remove_inventory(&mut self, variant_id: Option<Uuid>, qty: u32) -> Result<(), ProductError> {
        let slot = self.stock_slot(variant_id)?;
        *slot = slot.subtract(qty).ok_or(ProductError::InsufficientInventory)?;
        let stock = slot.value();
        self.stock_changed(variant_id, stock);
        Ok(())
    }

    pub fn set_rating(&mut self, rating: RatingSummary) { self.rating = rating; self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn stock_slot(&mut self, variant_id: Option<Uuid>) -> Result<&mut Quantity, ProductError> {
        match variant_id {
            Some(id) => self.variants.iter_mut().find(|v| v.id == id).map(|v| &mut v.stock).ok_or(ProductError::VariantNotFound),
            None if self.variants.is_empty() => Ok(&mut self.stock),
            None => Err(ProductError::VariantNotFound),
        }
    }

    fn stock_changed(&mut self, variant_id: Option<Uuid>, stock: u32) {
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted { product_id: self.id, variant_id, stock }));
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl RatingSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (sum, count) = ratings.into_iter().fold((0u32, 0u32), |(s, c), r| (s + u32::from(r), c + 1));
        if count == 0 { return Self::default(); }
        Self { average: (Decimal::from(sum) / Decimal::from(count)).round_dp(1), count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, InvalidPrice, InsufficientInventory, VariantNotFound, DuplicateVariantSku }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::InvalidPrice => write!(f, "Price must be positive"),
            Self::InsufficientInventory => write!(f, "Insufficient inventory"),
            Self::VariantNotFound => write!(f, "Variant not found"),
            Self::DuplicateVariantSku => write!(f, "Variant SKU already used by this product"),
        }
    }
}
