use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::Cart;
use crate::pricing::PricedCart;
use crate::service::{Actor, Marketplace};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
}

impl Marketplace {
    pub async fn get_cart(&self, actor: Option<&Actor>, session: &str) -> Result<PricedCart> {
        let cart = self.open_cart(actor, session).await?;
        self.price(&cart).await
    }

    pub async fn add_to_cart(&self, actor: Option<&Actor>, session: &str, req: AddToCart) -> Result<PricedCart> {
        self.check_quantity(req.quantity)?;
        let mut cart = self.open_cart(actor, session).await?;
        let catalog = self.purchasable(&HashSet::from([req.product_id])).await?;
        let product = catalog.get(&req.product_id).ok_or(EcommerceError::NotFound("Product"))?;
        let resolved = product.resolve(req.variant_id)?;

        let line = cart.add_line(req.product_id, resolved.variant_id, req.quantity);
        let (line_id, quantity) = (line.id, line.quantity);
        self.check_quantity(quantity)?;
        if !resolved.stock.covers(quantity) {
            return Err(EcommerceError::InsufficientInventory);
        }
        if let Some(actor) = actor { cart.claim(actor.id()); }
        self.storage.save(&cart).await?;
        debug!(session, %line_id, quantity, "cart line added");
        self.price(&cart).await
    }

    /// A quantity of zero removes the line.
    pub async fn update_cart_line(&self, actor: Option<&Actor>, session: &str, line_id: Uuid, quantity: u32) -> Result<PricedCart> {
        if quantity > 0 { self.check_quantity(quantity)?; }
        let mut cart = self.open_cart(actor, session).await?;
        cart.update_quantity(line_id, quantity)?;
        self.storage.save(&cart).await?;
        self.price(&cart).await
    }

    pub async fn remove_cart_line(&self, actor: Option<&Actor>, session: &str, line_id: Uuid) -> Result<PricedCart> {
        let mut cart = self.open_cart(actor, session).await?;
        cart.remove_line(line_id)?;
        self.storage.save(&cart).await?;
        self.price(&cart).await
    }

    pub async fn clear_cart(&self, actor: Option<&Actor>, session: &str) -> Result<()> {
        self.open_cart(actor, session).await?;
        self.storage.remove::<Cart>(session).await?;
        Ok(())
    }

    /// Loads the session's cart, or a fresh one. A cart claimed by a customer
    /// is only reachable by that customer.
    pub(crate) async fn open_cart(&self, actor: Option<&Actor>, session: &str) -> Result<Cart> {
        if session.trim().is_empty() || session.len() > 128 {
            return Err(EcommerceError::Validation("invalid cart session".into()));
        }
        let cart = self.storage.find::<Cart>(session).await?.unwrap_or_else(|| Cart::new(session));
        match cart.customer_id() {
            Some(owner) if actor.map_or(true, |a| a.id() != owner && !a.is_admin()) => Err(EcommerceError::Forbidden("cart belongs to another customer".into())),
            _ => Ok(cart),
        }
    }

    pub(crate) async fn price(&self, cart: &Cart) -> Result<PricedCart> {
        let ids: HashSet<Uuid> = cart.lines().iter().map(|l| l.product_id).collect();
        let catalog = self.purchasable(&ids).await?;
        Ok(self.pricing.price_cart(cart, &catalog))
    }

    fn check_quantity(&self, quantity: u32) -> Result<()> {
        let max = self.pricing.max_line_quantity;
        if (1..=max).contains(&quantity) { Ok(()) } else { Err(EcommerceError::InvalidQuantity { max }) }
    }
}
