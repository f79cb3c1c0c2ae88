//! Cart pricing.
//!
//! A cart stores only what was selected. Every time it is shown or checked
//! out, its lines are priced against the current catalog: variants are
//! re-resolved, unavailable lines are flagged and left out of the totals, and
//! shipping and tax are derived from the remaining subtotal.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem, OrderTotals, Product};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq)]
pub struct PricingPolicy {
    pub currency: String,
    pub tax_rate: Decimal,
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Option<Decimal>,
    pub max_line_quantity: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            tax_rate: Decimal::new(18, 2),
            shipping_fee: Decimal::new(500, 2),
            free_shipping_threshold: Some(Decimal::new(5000, 2)),
            max_line_quantity: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PricedCart {
    pub session: String,
    pub customer_id: Option<Uuid>,
    pub lines: Vec<PricedLine>,
    pub item_count: u32,
    pub subtotal: Money,
    pub savings: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
    pub checkout_ready: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct PricedLine {
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub title: Option<String>,
    pub variant_label: Option<String>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Money>,
    pub compare_at_price: Option<Money>,
    pub line_total: Option<Money>,
    pub savings: Option<Money>,
    pub issue: Option<LineIssue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineIssue {
    ProductUnavailable,
    VariantUnavailable,
    InsufficientStock { available: u32 },
    CurrencyMismatch,
}

impl std::fmt::Display for LineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProductUnavailable => write!(f, "product is no longer available"),
            Self::VariantUnavailable => write!(f, "selected variant is no longer available"),
            Self::InsufficientStock { available } => write!(f, "only {available} left in stock"),
            Self::CurrencyMismatch => write!(f, "priced in a different currency"),
        }
    }
}

impl PricedLine {
    pub fn is_available(&self) -> bool { self.issue.is_none() }
}

impl PricingPolicy {
    pub fn zero(&self) -> Money { Money::zero(&self.currency) }

    /// Prices `cart` against `catalog`, which holds only products a shopper may
    /// currently buy.
    pub fn price_cart(&self, cart: &Cart, catalog: &HashMap<Uuid, Product>) -> PricedCart {
        let lines: Vec<PricedLine> = cart.lines().iter().map(|line| {
            let mut priced = PricedLine {
                line_id: line.id, product_id: line.product_id, variant_id: line.variant_id, store_id: None,
                title: None, variant_label: None, sku: None, quantity: line.quantity, unit_price: None,
                compare_at_price: None, line_total: None, savings: None, issue: None,
            };
            let Some(product) = catalog.get(&line.product_id) else {
                priced.issue = Some(LineIssue::ProductUnavailable);
                return priced;
            };
            priced.store_id = Some(product.store_id());
            priced.title = Some(product.name().to_string());
            let resolved = match product.resolve(line.variant_id) {
                Ok(resolved) => resolved,
                Err(_) => {
                    priced.issue = Some(LineIssue::VariantUnavailable);
                    return priced;
                }
            };
            priced.variant_id = resolved.variant_id;
            priced.variant_label = resolved.label;
            priced.sku = Some(resolved.sku.to_string());
            if resolved.price.currency() != self.currency {
                priced.issue = Some(LineIssue::CurrencyMismatch);
                return priced;
            }
            let line_total = resolved.price.multiply(line.quantity);
            let savings = resolved.compare_at_price.as_ref()
                .filter(|mrp| mrp.amount() > resolved.price.amount())
                .and_then(|mrp| mrp.sub(&resolved.price).ok())
                .map(|per_unit| per_unit.multiply(line.quantity))
                .unwrap_or_else(|| self.zero());
            if !resolved.stock.covers(line.quantity) {
                priced.issue = Some(LineIssue::InsufficientStock { available: resolved.stock.value() });
            }
            priced.unit_price = Some(resolved.price);
            priced.compare_at_price = resolved.compare_at_price;
            priced.line_total = Some(line_total);
            priced.savings = Some(savings);
            priced
        }).collect();

        let available = lines.iter().filter(|l| l.is_available());
        let (subtotal, savings, item_count) = available.fold((self.zero(), self.zero(), 0u32), |(sub, sav, count), l| {
            let sub = l.line_total.as_ref().and_then(|t| sub.add(t).ok()).unwrap_or(sub);
            let sav = l.savings.as_ref().and_then(|s| sav.add(s).ok()).unwrap_or(sav);
            (sub, sav, count + l.quantity)
        });
        let shipping = self.shipping_for(&subtotal);
        let tax = subtotal.apply_rate(self.tax_rate);
        let total = Money::new(subtotal.amount() + shipping.amount() + tax.amount(), &self.currency);
        let checkout_ready = !lines.is_empty() && lines.iter().all(PricedLine::is_available);

        PricedCart {
            session: cart.session().to_string(), customer_id: cart.customer_id(), lines, item_count,
            subtotal, savings, shipping, tax, total, checkout_ready,
        }
    }

    pub fn shipping_for(&self, subtotal: &Money) -> Money {
        let free = subtotal.is_zero() || self.free_shipping_threshold.is_some_and(|t| subtotal.amount() >= t);
        if free { self.zero() } else { Money::new(self.shipping_fee, &self.currency) }
    }
}

impl PricedCart {
    pub fn issues(&self) -> Vec<String> {
        self.lines.iter()
            .filter_map(|l| l.issue.as_ref().map(|issue| format!("{}: {}", l.title.as_deref().unwrap_or("item"), issue)))
            .collect()
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal.clone(), savings: self.savings.clone(), shipping: self.shipping.clone(),
            tax: self.tax.clone(), total: self.total.clone(),
        }
    }

    /// Order lines for every available cart line.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.lines.iter().filter(|l| l.is_available()).filter_map(|l| {
            Some(LineItem {
                product_id: l.product_id, variant_id: l.variant_id, store_id: l.store_id?,
                title: l.title.clone()?, variant_label: l.variant_label.clone(), sku: l.sku.clone()?,
                unit_price: l.unit_price.clone()?, compare_at_price: l.compare_at_price.clone(),
                quantity: l.quantity, total: l.line_total.clone()?,
            })
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Sku;

    fn usd(cents: i64) -> Money { Money::usd(Decimal::new(cents, 2)) }

    fn catalog(products: Vec<Product>) -> HashMap<Uuid, Product> {
        products.into_iter().map(|p| (p.id(), p)).collect()
    }

    fn rice_product() -> (Product, Uuid) {
        let mut p = Product::create(Uuid::now_v7(), Sku::new("RICE").unwrap(), "Rice", usd(0)).unwrap();
        let v = p.add_variant("5 kg", Sku::new("RICE-5").unwrap(), usd(1200), Some(usd(1500)), 4).unwrap();
        (p, v)
    }

    #[test]
    fn test_prices_lines_with_savings_shipping_and_tax() {
        let (rice, variant) = rice_product();
        let mut cart = Cart::new("s1");
        cart.add_line(rice.id(), Some(variant), 2);
        let priced = PricingPolicy::default().price_cart(&cart, &catalog(vec![rice]));

        assert!(priced.checkout_ready);
        assert_eq!(priced.item_count, 2);
        assert_eq!(priced.subtotal, usd(2400));
        assert_eq!(priced.savings, usd(600));
        assert_eq!(priced.shipping, usd(500));
        // 24.00 * 0.18
        assert_eq!(priced.tax, usd(432));
        assert_eq!(priced.total, usd(3332));
        assert_eq!(priced.line_items().len(), 1);
    }

    #[test]
    fn test_free_shipping_over_threshold() {
        let (rice, variant) = rice_product();
        let mut cart = Cart::new("s1");
        cart.add_line(rice.id(), Some(variant), 4);
        let priced = PricingPolicy::default().price_cart(&cart, &catalog(vec![rice]));
        assert_eq!(priced.subtotal, usd(4800));
        assert_eq!(priced.shipping, usd(500));

        let policy = PricingPolicy { free_shipping_threshold: Some(Decimal::new(4000, 2)), ..Default::default() };
        let (rice, variant) = rice_product();
        let mut cart = Cart::new("s1");
        cart.add_line(rice.id(), Some(variant), 4);
        assert!(policy.price_cart(&cart, &catalog(vec![rice])).shipping.is_zero());
    }

    #[test]
    fn test_unavailable_lines_are_excluded() {
        let (rice, variant) = rice_product();
        let mut cart = Cart::new("s1");
        cart.add_line(rice.id(), Some(variant), 5);
        cart.add_line(Uuid::now_v7(), None, 1);
        cart.add_line(rice.id(), Some(Uuid::now_v7()), 1);
        let priced = PricingPolicy::default().price_cart(&cart, &catalog(vec![rice]));

        assert!(!priced.checkout_ready);
        assert_eq!(priced.lines[0].issue, Some(LineIssue::InsufficientStock { available: 4 }));
        assert_eq!(priced.lines[1].issue, Some(LineIssue::ProductUnavailable));
        assert_eq!(priced.lines[2].issue, Some(LineIssue::VariantUnavailable));
        assert!(priced.subtotal.is_zero());
        assert!(priced.shipping.is_zero());
        assert_eq!(priced.issues().len(), 3);
    }

    #[test]
    fn test_empty_cart_is_not_ready() {
        let priced = PricingPolicy::default().price_cart(&Cart::new("s1"), &HashMap::new());
        assert!(!priced.checkout_ready);
        assert!(priced.total.is_zero());
    }
}
