//! In-process API tests: the router is driven with `tower::ServiceExt::oneshot`
//! over the in-memory store, no socket involved.

use std::str::FromStr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use opensase_marketplace::api::{self, AppState, USER_HEADER};
use opensase_marketplace::config::PaymentSettings;
use opensase_marketplace::events::EventBus;
use opensase_marketplace::gateway::SimulatedGateway;
use opensase_marketplace::pricing::PricingPolicy;
use opensase_marketplace::service::Marketplace;
use opensase_marketplace::storage::StorageService;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestApp {
    router: axum::Router,
    admin: String,
}

impl TestApp {
    async fn new() -> Self {
        let marketplace = Marketplace::new(
            StorageService::in_memory(),
            EventBus::default(),
            Box::new(SimulatedGateway::new(PaymentSettings { delay: Duration::ZERO, decline_above: Some(Decimal::new(50, 0)) })),
            PricingPolicy::default(),
        );
        let admin = marketplace.bootstrap_admin("root@example.com").await.unwrap().id.to_string();
        Self { router: api::router(AppState::new(marketplace)), admin }
    }

    async fn call(&self, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user { req = req.header(USER_HEADER, user); }
        let req = match body {
            Some(body) => req.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.expect("oneshot failed");
        let status = resp.status();
        let bytes = resp.into_body().collect().await.expect("body collect failed").to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("body is not valid JSON") };
        (status, json)
    }

    async fn register(&self, email: &str, role: &str) -> String {
        let (status, user) = self.call("POST", "/api/v1/users", None, Some(json!({"name": "Test", "email": email, "role": role}))).await;
        assert_eq!(status, StatusCode::CREATED, "{user}");
        user["id"].as_str().unwrap().to_string()
    }

    /// An approved store with one active product priced 10.00; returns
    /// `(seller, product)`.
    async fn open_shop(&self, stock: u32) -> (String, String) {
        let seller = self.register("seller@example.com", "seller").await;
        let (_, store) = self.call("POST", "/api/v1/stores", Some(&seller), Some(json!({"name": "Green Grocer"}))).await;
        let uri = format!("/api/v1/stores/{}/review", store["id"].as_str().unwrap());
        let (status, _) = self.call("POST", &uri, Some(&self.admin), Some(json!({"status": "approved"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, product) = self.call("POST", "/api/v1/products", Some(&seller), Some(json!({
            "name": "Basmati Rice", "sku": "rice-1", "price": "10.00", "stock": stock,
        }))).await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        let product = product["id"].as_str().unwrap().to_string();
        let (status, _) = self.call("POST", &format!("/api/v1/products/{product}/publish"), Some(&seller), None).await;
        assert_eq!(status, StatusCode::OK);
        (seller, product)
    }

    async fn customer_with_address(&self) -> String {
        let customer = self.register("ada@example.com", "customer").await;
        let (status, _) = self.call("POST", &format!("/api/v1/users/{customer}/addresses"), Some(&customer), Some(json!({
            "line1": "1 Marina", "city": "Lagos", "postal_code": "100001", "country": "NG",
        }))).await;
        assert_eq!(status, StatusCode::CREATED);
        customer
    }
}

fn decimal(v: &Value) -> Decimal { Decimal::from_str(v.as_str().expect("decimal as string")).unwrap() }

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = TestApp::new().await;
    let (status, json) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn unknown_or_malformed_user_header_is_401() {
    let app = TestApp::new().await;
    let (status, json) = app.call("GET", "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthenticated");
    let (status, _) = app.call("GET", "/api/v1/users/me", Some("not-a-uuid"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, json) = app.call("GET", "/api/v1/users/me", Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["role"], "admin");
}

#[tokio::test]
async fn storefront_hides_unpublished_products() {
    let app = TestApp::new().await;
    let (_, product) = app.open_shop(5).await;
    let (status, page) = app.call("GET", "/api/v1/products?sort=price_asc&in_stock=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["sku"], "RICE-1");

    let (status, _) = app.call("POST", &format!("/api/v1/products/{product}/archive"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call("GET", &format!("/api/v1/products/{product}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cart_is_priced_against_the_catalog() {
    let app = TestApp::new().await;
    let (_, product) = app.open_shop(5).await;
    let (status, cart) = app.call("POST", "/api/v1/cart/guest-1/items", None, Some(json!({"product_id": product, "quantity": 3}))).await;
    assert_eq!(status, StatusCode::CREATED, "{cart}");
    assert_eq!(decimal(&cart["subtotal"]["amount"]), Decimal::new(3000, 2));
    assert_eq!(decimal(&cart["shipping"]["amount"]), Decimal::new(500, 2));
    assert_eq!(decimal(&cart["tax"]["amount"]), Decimal::new(540, 2));
    assert_eq!(decimal(&cart["total"]["amount"]), Decimal::new(4040, 2));
    assert_eq!(cart["checkout_ready"], true);

    let (status, json) = app.call("POST", "/api/v1/cart/guest-1/items", None, Some(json!({"product_id": product, "quantity": 11}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_quantity");
    let (status, json) = app.call("POST", "/api/v1/cart/guest-1/items", None, Some(json!({"product_id": product, "quantity": 3}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "insufficient_inventory");

    let line = cart["lines"][0]["line_id"].as_str().unwrap();
    let (status, cart) = app.call("PUT", &format!("/api/v1/cart/guest-1/items/{line}"), None, Some(json!({"quantity": 0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn card_checkout_then_fulfilment() {
    let app = TestApp::new().await;
    let (seller, product) = app.open_shop(5).await;
    let customer = app.customer_with_address().await;

    let (status, json) = app.call("POST", "/api/v1/checkout", Some(&customer), Some(json!({"session": "s1", "payment_method": "card"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "empty_cart");

    app.call("POST", "/api/v1/cart/s1/items", Some(&customer), Some(json!({"product_id": product, "quantity": 2}))).await;
    let (status, outcome) = app.call("POST", "/api/v1/checkout", Some(&customer), Some(json!({"session": "s1", "payment_method": "card"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{outcome}");
    assert_eq!(outcome["order"]["status"], "confirmed");
    assert_eq!(outcome["order"]["payment_status"], "paid");
    assert_eq!(outcome["payment"]["status"], "succeeded");
    let order = outcome["order"]["id"].as_str().unwrap().to_string();

    let (_, p) = app.call("GET", &format!("/api/v1/products/{product}"), None, None).await;
    assert_eq!(p["stock"], 3);

    for status_name in ["packed", "shipped", "delivered"] {
        let (status, json) = app.call("POST", &format!("/api/v1/orders/{order}/status"), Some(&seller), Some(json!({"status": status_name}))).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["status"], status_name);
    }
    let (status, json) = app.call("POST", &format!("/api/v1/orders/{order}/status"), Some(&seller), Some(json!({"status": "packed"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");

    let (status, review) = app.call("POST", &format!("/api/v1/products/{product}/reviews"), Some(&customer), Some(json!({"rating": 4, "body": "Fragrant"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    let (_, p) = app.call("GET", &format!("/api/v1/products/{product}"), None, None).await;
    assert_eq!(p["rating"]["count"], 1);

    let (status, _) = app.call("POST", &format!("/api/v1/orders/{order}/refund"), Some(&seller), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, json) = app.call("POST", &format!("/api/v1/orders/{order}/refund"), Some(&app.admin), Some(json!({"note": "damaged"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["payment_status"], "refunded");

    let (_, payments) = app.call("GET", "/api/v1/payments?status=refunded", Some(&app.admin), None).await;
    assert_eq!(payments["total"], 1);
}

#[tokio::test]
async fn declined_card_cancels_order_and_restocks() {
    let app = TestApp::new().await;
    let (_, product) = app.open_shop(10).await;
    let customer = app.customer_with_address().await;
    // 50.00 + 9.00 tax, above the 50.00 decline limit
    app.call("POST", "/api/v1/cart/s2/items", Some(&customer), Some(json!({"product_id": product, "quantity": 5}))).await;
    let (status, outcome) = app.call("POST", "/api/v1/checkout", Some(&customer), Some(json!({"session": "s2", "payment_method": "card"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{outcome}");
    assert_eq!(decimal(&outcome["order"]["totals"]["total"]["amount"]), Decimal::new(5900, 2));
    assert_eq!(outcome["order"]["status"], "cancelled");
    assert_eq!(outcome["order"]["payment_status"], "failed");
    assert_eq!(outcome["payment"]["status"], "failed");

    let (_, p) = app.call("GET", &format!("/api/v1/products/{product}"), None, None).await;
    assert_eq!(p["stock"], 10);
    let (_, cart) = app.call("GET", "/api/v1/cart/s2", Some(&customer), None).await;
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
async fn customer_cancels_pending_cod_order() {
    let app = TestApp::new().await;
    let (_, product) = app.open_shop(5).await;
    let customer = app.customer_with_address().await;
    app.call("POST", "/api/v1/cart/s3/items", Some(&customer), Some(json!({"product_id": product, "quantity": 1}))).await;
    let (_, outcome) = app.call("POST", "/api/v1/checkout", Some(&customer), Some(json!({"session": "s3"}))).await;
    assert_eq!(outcome["order"]["status"], "pending");
    assert_eq!(outcome["order"]["payment_method"], "cod");
    let order = outcome["order"]["id"].as_str().unwrap();

    let (status, json) = app.call("POST", &format!("/api/v1/orders/{order}/cancel"), Some(&customer), Some(json!({"note": "changed my mind"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");
    assert_eq!(json["cancellation_reason"], "changed my mind");

    let (_, p) = app.call("GET", &format!("/api/v1/products/{product}"), None, None).await;
    assert_eq!(p["stock"], 5);
    let (_, orders) = app.call("GET", "/api/v1/orders?status=cancelled", Some(&customer), None).await;
    assert_eq!(orders["total"], 1);
}

#[tokio::test]
async fn only_admins_moderate() {
    let app = TestApp::new().await;
    let customer = app.register("c@example.com", "customer").await;
    let (status, _) = app.call("GET", "/api/v1/users", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("POST", "/api/v1/categories", Some(&customer), Some(json!({"name": "Grains"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, json) = app.call("POST", &format!("/api/v1/users/{customer}/block"), Some(&app.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "blocked");
    let (status, _) = app.call("GET", "/api/v1/users/me", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
