use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, LineItem, Order, OrderStatus, Payment, PaymentMethod, Product};
use crate::gateway::ChargeOutcome;
use crate::service::{Actor, Marketplace};
use crate::{EcommerceError, Result};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub session: String,
    pub address_id: Option<Uuid>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub payment: Payment,
}

impl Marketplace {
    /// Turns the session's cart into an order.
    ///
    /// Stock is taken before the order is written and returned if the order
    /// cannot be recorded. Card orders are charged straight away: an approved
    /// charge confirms the order, a declined one cancels it and puts the stock
    /// back. Cash-on-delivery orders stay pending until a seller confirms them.
    pub async fn checkout(&self, actor: &Actor, req: CheckoutRequest) -> Result<CheckoutOutcome> {
        let cart = self.open_cart(Some(actor), &req.session).await?;
        if cart.is_empty() { return Err(EcommerceError::EmptyCart); }
        let customer = self.load_user(actor.id()).await?;

        let mut order = {
            let _guard = self.inventory.lock().await;
            let priced = self.price(&cart).await?;
            if !priced.checkout_ready { return Err(EcommerceError::CartUnavailable(priced.issues())); }
            let address = match req.address_id {
                Some(id) => customer.address(id).cloned().ok_or(EcommerceError::NotFound("Address"))?,
                None => customer.default_address().cloned().ok_or(EcommerceError::AddressRequired)?,
            };
            let number = self.unused_order_number(order_number).await?;
            let order = Order::place(number, actor.id(), address, priced.line_items(), priced.totals(), req.payment_method)?;
            self.take_stock(order.items()).await?;
            order
        };
        let mut payment = Payment::open(order.id(), actor.id(), order.total().clone(), req.payment_method);
        let _order_guard = self.lock_order(order.id()).await;
        if let Err(e) = self.record_order(&order, &payment).await {
            error!(order_number = order.order_number(), error = %e, "order not recorded, returning stock");
            self.restock(order.items()).await?;
            return Err(e);
        }
        self.storage.remove::<Cart>(cart.session()).await?;
        info!(order_id = %order.id(), order_number = order.order_number(), total = %order.total(), method = ?req.payment_method, "order placed");

        if req.payment_method == PaymentMethod::Card {
            match self.gateway.charge(payment.id, &payment.amount).await {
                ChargeOutcome::Approved { transaction_ref } => {
                    payment.succeed(transaction_ref);
                    order.mark_paid(payment.id)?;
                    order.transition(OrderStatus::Confirmed, None, Some("payment received".into()))?;
                    info!(order_id = %order.id(), payment_id = %payment.id, "payment approved");
                }
                ChargeOutcome::Declined { reason } => {
                    payment.fail(reason.clone());
                    order.mark_payment_failed(payment.id, reason.clone())?;
                    order.transition(OrderStatus::Cancelled, None, Some(format!("payment declined: {reason}")))?;
                    self.restock(order.items()).await?;
                    warn!(order_id = %order.id(), payment_id = %payment.id, %reason, "payment declined");
                }
            }
            self.storage.update(&payment).await?;
            self.storage.update(&order).await?;
        }

        let events = order.take_events();
        self.publish(events).await;
        Ok(CheckoutOutcome { order, payment })
    }

    /// Writes a new order with its payment record, or neither.
    async fn record_order(&self, order: &Order, payment: &Payment) -> Result<()> {
        self.storage.save(order).await?;
        if let Err(e) = self.storage.save(payment).await {
            if let Err(cleanup) = self.storage.remove::<Order>(&order.id().to_string()).await {
                error!(order_id = %order.id(), error = %cleanup, "failed to remove order without payment");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Draws order numbers until one is not in use yet. Callers hold the
    /// inventory lock, so two checkouts never pick the same number.
    async fn unused_order_number(&self, mut draw: impl FnMut() -> String) -> Result<String> {
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = draw();
            let taken = self.storage.list_where::<Order>(|o| o.order_number() == candidate).await?;
            if taken.is_empty() { return Ok(candidate); }
            debug!(order_number = %candidate, "order number taken, drawing again");
        }
        Err(EcommerceError::Conflict("could not allocate an order number".into()))
    }

    /// Takes stock for every line, or for none of them.
    async fn take_stock(&self, items: &[LineItem]) -> Result<()> {
        let mut products: HashMap<Uuid, Product> = HashMap::new();
        for item in items {
            let product = match products.entry(item.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(self.load_product(item.product_id).await?),
            };
            product.remove_inventory(item.variant_id, item.quantity)?;
        }
        self.save_products(products).await
    }

    /// Puts stock back for order lines. Products or variants deleted since the
    /// order was placed are skipped.
    pub(crate) async fn restock(&self, items: &[LineItem]) -> Result<()> {
        let _guard = self.inventory.lock().await;
        let mut products: HashMap<Uuid, Product> = HashMap::new();
        for item in items {
            let product = match products.entry(item.product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => match self.storage.find::<Product>(&item.product_id.to_string()).await? {
                    Some(p) => e.insert(p),
                    None => {
                        warn!(product_id = %item.product_id, "cannot restock deleted product");
                        continue;
                    }
                },
            };
            if product.add_inventory(item.variant_id, item.quantity).is_err() {
                warn!(product_id = %item.product_id, variant_id = ?item.variant_id, "cannot restock removed variant");
            }
        }
        self.save_products(products).await
    }

    async fn save_products(&self, products: HashMap<Uuid, Product>) -> Result<()> {
        for (_, mut product) in products {
            self.storage.update(&product).await?;
            let events = product.take_events();
            self.publish(events).await;
        }
        Ok(())
    }
}

const ORDER_NUMBER_ATTEMPTS: usize = 8;

fn order_number() -> String { format!("ORD-{:08}", rand::random::<u32>() % 100_000_000) }

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::*;
    use crate::config::PaymentSettings;
    use crate::domain::aggregates::{Address, PaymentStatus, Role, StoreStatus, TransactionStatus};
    use crate::service::catalog::{NewProduct, NewVariant};
    use crate::service::stores::NewStore;
    use crate::service::testing::{marketplace, marketplace_with, marketplace_with_faults};
    use crate::service::{AddToCart, NewUser, OrderFilter, PageRequest};
    use crate::storage::Collection;

    struct Shop { m: Marketplace, admin: Actor, seller: Actor, customer: Actor, product: Uuid }

    async fn shop(m: Marketplace, stock: u32) -> Shop {
        let admin = m.bootstrap_admin("root@example.com").await.unwrap();
        let admin = m.authenticate(admin.id).await.unwrap();
        let seller = m.register(NewUser { name: "S".into(), email: "s@example.com".into(), phone: None, role: Role::Seller }).await.unwrap();
        let seller = m.authenticate(seller.id).await.unwrap();
        let store = m.apply_for_store(&seller, NewStore { name: "Grocer".into(), description: None, logo_url: None }).await.unwrap();
        m.review_store(&admin, store.id, StoreStatus::Approved, None).await.unwrap();
        let product = m.create_product(&seller, NewProduct {
            name: "Rice".into(), description: None, sku: "RICE".into(), price: Decimal::new(1000, 2), compare_at_price: None,
            category_id: None, stock, tags: vec![], images: vec![], variants: vec![],
        }).await.unwrap();
        m.publish_product(&seller, product.id()).await.unwrap();

        let customer = m.register(NewUser { name: "C".into(), email: "c@example.com".into(), phone: None, role: Role::Customer }).await.unwrap();
        let customer = m.authenticate(customer.id).await.unwrap();
        let address = Address { line1: "1 Marina".into(), city: "Lagos".into(), postal_code: "100001".into(), country: "NG".into(), ..Default::default() };
        m.add_address(&customer, customer.id(), address).await.unwrap();
        Shop { m, admin, seller, customer, product: product.id() }
    }

    async fn variant_stock(m: &Marketplace, product: Uuid) -> Vec<u32> {
        m.load_product(product).await.unwrap().variants().iter().map(|v| v.stock.value()).collect()
    }

    fn checkout(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest { session: "sess".into(), address_id: None, payment_method: method }
    }

    #[tokio::test]
    async fn test_card_checkout_confirms_and_takes_stock() {
        let Shop { m, customer, product, .. } = shop(marketplace(), 5).await;
        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 2 }).await.unwrap();

        let outcome = m.checkout(&customer, checkout(PaymentMethod::Card)).await.unwrap();
        assert_eq!(outcome.order.status(), OrderStatus::Confirmed);
        assert_eq!(outcome.order.payment_status(), PaymentStatus::Paid);
        assert_eq!(outcome.payment.status, TransactionStatus::Succeeded);
        // 20.00 + 5.00 shipping + 3.60 tax
        assert_eq!(outcome.order.total().amount(), Decimal::new(2860, 2));
        assert_eq!(m.load_product(product).await.unwrap().stock().value(), 3);
        assert!(m.get_cart(Some(&customer), "sess").await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_declined_card_cancels_and_restocks() {
        let settings = PaymentSettings { delay: Duration::ZERO, decline_above: Some(Decimal::new(10, 0)) };
        let Shop { m, customer, product, .. } = shop(marketplace_with(settings), 5).await;
        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 2 }).await.unwrap();

        let outcome = m.checkout(&customer, checkout(PaymentMethod::Card)).await.unwrap();
        assert_eq!(outcome.order.status(), OrderStatus::Cancelled);
        assert_eq!(outcome.order.payment_status(), PaymentStatus::Failed);
        assert_eq!(outcome.payment.status, TransactionStatus::Failed);
        assert_eq!(m.load_product(product).await.unwrap().stock().value(), 5);
    }

    #[tokio::test]
    async fn test_cod_checkout_stays_pending() {
        let Shop { m, customer, product, .. } = shop(marketplace(), 5).await;
        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 1 }).await.unwrap();
        let outcome = m.checkout(&customer, checkout(PaymentMethod::Cod)).await.unwrap();
        assert_eq!(outcome.order.status(), OrderStatus::Pending);
        assert_eq!(outcome.payment.status, TransactionStatus::Pending);
        assert!(outcome.order.order_number().starts_with("ORD-"));
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_and_oversold_carts() {
        let Shop { m, admin, customer, product, .. } = shop(marketplace(), 2).await;
        assert!(matches!(m.checkout(&customer, checkout(PaymentMethod::Cod)).await, Err(EcommerceError::EmptyCart)));

        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 2 }).await.unwrap();
        m.set_stock(&admin, product, None, 1).await.unwrap();
        assert!(matches!(m.checkout(&customer, checkout(PaymentMethod::Cod)).await, Err(EcommerceError::CartUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unavailable_lines_reported_before_missing_address() {
        let Shop { m, admin, product, .. } = shop(marketplace(), 2).await;
        let newcomer = m.register(NewUser { name: "N".into(), email: "n@example.com".into(), phone: None, role: Role::Customer }).await.unwrap();
        let newcomer = m.authenticate(newcomer.id).await.unwrap();
        m.add_to_cart(Some(&newcomer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 2 }).await.unwrap();

        m.set_stock(&admin, product, None, 1).await.unwrap();
        assert!(matches!(m.checkout(&newcomer, checkout(PaymentMethod::Cod)).await, Err(EcommerceError::CartUnavailable(_))));
        m.set_stock(&admin, product, None, 5).await.unwrap();
        assert!(matches!(m.checkout(&newcomer, checkout(PaymentMethod::Cod)).await, Err(EcommerceError::AddressRequired)));
        assert_eq!(m.load_product(product).await.unwrap().stock().value(), 5);
    }

    #[tokio::test]
    async fn test_variant_stock_is_taken_and_returned() {
        let Shop { m, seller, customer, .. } = shop(marketplace(), 5).await;
        let variant = |label: &str, sku: &str, price, stock| NewVariant { label: label.into(), sku: sku.into(), price: Decimal::new(price, 2), compare_at_price: None, stock };
        let product = m.create_product(&seller, NewProduct {
            name: "Basmati".into(), description: None, sku: "BASMATI".into(), price: Decimal::new(400, 2), compare_at_price: None,
            category_id: None, stock: 0, tags: vec![], images: vec![],
            variants: vec![variant("1 kg", "BASMATI-1", 400, 4), variant("5 kg", "BASMATI-5", 1800, 3)],
        }).await.unwrap();
        let (small, large) = (product.variants()[0].id, product.variants()[1].id);
        let product = m.publish_product(&seller, product.id()).await.unwrap().id();
        let add = |variant_id, quantity| AddToCart { product_id: product, variant_id: Some(variant_id), quantity };

        // two lines of one product
        m.add_to_cart(Some(&customer), "sess", add(small, 2)).await.unwrap();
        m.add_to_cart(Some(&customer), "sess", add(large, 1)).await.unwrap();
        let first = m.checkout(&customer, checkout(PaymentMethod::Cod)).await.unwrap().order;
        assert_eq!(first.items().len(), 2);
        assert_eq!(variant_stock(&m, product).await, [2, 2]);
        m.cancel_order(&customer, first.id(), None).await.unwrap();
        assert_eq!(variant_stock(&m, product).await, [4, 3]);

        m.add_to_cart(Some(&customer), "sess", add(small, 1)).await.unwrap();
        m.add_to_cart(Some(&customer), "sess", add(large, 1)).await.unwrap();
        let second = m.checkout(&customer, checkout(PaymentMethod::Cod)).await.unwrap().order;
        assert_eq!(variant_stock(&m, product).await, [3, 2]);
        m.remove_variant(&seller, product, large).await.unwrap();
        m.cancel_order(&customer, second.id(), None).await.unwrap();
        assert_eq!(variant_stock(&m, product).await, [4]);
    }

    #[tokio::test]
    async fn test_unrecorded_order_returns_stock() {
        let (m, faults) = marketplace_with_faults();
        let Shop { m, customer, product, .. } = shop(m, 5).await;
        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 2 }).await.unwrap();

        for collection in [Collection::Orders, Collection::Payments] {
            faults.fail_writes(collection);
            assert!(matches!(m.checkout(&customer, checkout(PaymentMethod::Cod)).await, Err(EcommerceError::StorageError(_))));
            faults.heal();
            assert_eq!(m.load_product(product).await.unwrap().stock().value(), 5);
            assert_eq!(m.list_orders(&customer, OrderFilter::default(), PageRequest::default()).await.unwrap().total, 0);
            assert_eq!(m.get_cart(Some(&customer), "sess").await.unwrap().lines.len(), 1);
        }
        m.checkout(&customer, checkout(PaymentMethod::Cod)).await.unwrap();
        assert_eq!(m.load_product(product).await.unwrap().stock().value(), 3);
    }

    #[tokio::test]
    async fn test_order_numbers_are_not_reused() {
        let Shop { m, customer, product, .. } = shop(marketplace(), 5).await;
        m.add_to_cart(Some(&customer), "sess", AddToCart { product_id: product, variant_id: None, quantity: 1 }).await.unwrap();
        let taken = m.checkout(&customer, checkout(PaymentMethod::Cod)).await.unwrap().order.order_number().to_string();

        let mut draws = vec![taken.clone(), "ORD-00000001".to_string()].into_iter();
        let number = m.unused_order_number(move || draws.next().unwrap()).await.unwrap();
        assert_eq!(number, "ORD-00000001");
        assert!(matches!(m.unused_order_number(|| taken.clone()).await, Err(EcommerceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cart_limits() {
        let Shop { m, customer, product, .. } = shop(marketplace(), 3).await;
        let add = |quantity| AddToCart { product_id: product, variant_id: None, quantity };
        assert!(matches!(m.add_to_cart(Some(&customer), "sess", add(0)).await, Err(EcommerceError::InvalidQuantity { max: 10 })));
        assert!(matches!(m.add_to_cart(Some(&customer), "sess", add(4)).await, Err(EcommerceError::InsufficientInventory)));
        m.add_to_cart(Some(&customer), "sess", add(3)).await.unwrap();
        // claimed carts are private to their customer
        assert!(matches!(m.get_cart(None, "sess").await, Err(EcommerceError::Forbidden(_))));
    }
}
