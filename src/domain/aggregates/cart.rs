//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A shopper's pending selections, keyed by session. Prices are not stored on
/// the cart; see [`crate::pricing`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    session: String,
    customer_id: Option<Uuid>,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: u32,
}

impl Cart {
    pub fn new(session: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { session: session.into(), customer_id: None, lines: vec![], created_at: now, updated_at: now }
    }

    pub fn for_customer(session: impl Into<String>, customer_id: Uuid) -> Self {
        let mut cart = Self::new(session);
        cart.customer_id = Some(customer_id);
        cart
    }

    pub fn session(&self) -> &str { &self.session }
    pub fn customer_id(&self) -> Option<Uuid> { self.customer_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn claim(&mut self, customer_id: Uuid) { self.customer_id = Some(customer_id); self.touch(); }

    /// Adds a selection, merging into an existing line for the same product and
    /// variant. Returns the resulting line.
    pub fn add_line(&mut self, product_id: Uuid, variant_id: Option<Uuid>, quantity: u32) -> &CartLine {
        let index = match self.lines.iter().position(|l| l.product_id == product_id && l.variant_id == variant_id) {
            Some(i) => {
                self.lines[i].quantity = self.lines[i].quantity.saturating_add(quantity);
                i
            }
            None => {
                self.lines.push(CartLine { id: Uuid::now_v7(), product_id, variant_id, quantity });
                self.lines.len() - 1
            }
        };
        self.touch();
        &self.lines[index]
    }

    /// Setting a quantity of zero removes the line.
    pub fn update_quantity(&mut self, line_id: Uuid, quantity: u32) -> Result<(), CartError> {
        let line = self.lines.iter_mut().find(|l| l.id == line_id).ok_or(CartError::ItemNotFound)?;
        if quantity == 0 { self.lines.retain(|l| l.id != line_id); }
        else { line.quantity = quantity; }
        self.touch();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before { return Err(CartError::ItemNotFound); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Cart item not found") }
}
