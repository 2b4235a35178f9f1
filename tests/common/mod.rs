#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::{json, Value};
use storefront_api::{
    build_router,
    config::AppConfig,
    db,
    entities::{order, product},
    gateway::{GatewaySecrets, RazorpayClient},
    handlers::{payment_webhooks::SIGNATURE_HEADER, AppServices},
    repositories::{OrderRepository, ProductRepository},
    services::checkout::{CheckoutItem, CheckoutRequest, OrderDetails},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const KEY_ID: &str = "rzp_test_key";
pub const KEY_SECRET: &str = "rzp_test_secret";

/// Test application: in-memory SQLite, a mock gateway and the full router
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockServer,
    pub secrets: GatewaySecrets,
}

impl TestApp {
    pub async fn new() -> Self {
        let gateway = MockServer::start().await;

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // One connection so every query sees the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.tax_rate = dec!(0.18);
        cfg.shipping_fee = dec!(99);
        cfg.free_shipping_threshold = Some(dec!(1999));
        cfg.razorpay.key_id = KEY_ID.to_string();
        cfg.razorpay.key_secret = KEY_SECRET.to_string();
        cfg.razorpay.api_base_url = gateway.uri();
        cfg.razorpay.request_timeout_secs = 5;
        cfg.reconciliation.request_delay_ms = 0;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("connect to in-memory sqlite");
        db::run_migrations(&pool).await.expect("run migrations");
        let db = Arc::new(pool);

        let client = RazorpayClient::new(&cfg.razorpay).expect("gateway client");
        let services = AppServices::new(db.clone(), &cfg, Arc::new(client));
        let secrets = GatewaySecrets::from_config(&cfg.razorpay);

        let state = AppState {
            db,
            config: cfg,
            services,
        };

        Self {
            router: build_router(state.clone()),
            state,
            gateway,
            secrets,
        }
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.state.db.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.state.db.clone())
    }

    /// Send a request against the router
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router error during test request")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// POST a raw webhook body, optionally signed
    pub async fn post_webhook(&self, body: &str, signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/payments/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }

        self.router
            .clone()
            .oneshot(
                builder
                    .body(Body::from(body.to_string()))
                    .expect("build webhook request"),
            )
            .await
            .expect("router error during webhook request")
    }

    /// Delivers a webhook signed with the configured secret
    pub async fn post_signed_webhook(&self, body: &str) -> Response {
        let signature = self.secrets.sign_webhook(body.as_bytes());
        self.post_webhook(body, Some(&signature)).await
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, sizes: &[(&str, i32)]) -> product::Model {
        self.products()
            .create_with_sizes(name, price, sizes)
            .await
            .expect("seed product")
    }

    pub async fn stock(&self, product_id: Uuid, size: &str) -> i32 {
        self.products()
            .find_size(self.state.db.as_ref(), product_id, size)
            .await
            .expect("load size")
            .expect("size exists")
            .stock
    }

    /// Places a pending order through checkout
    pub async fn place_order(&self, lines: &[(Uuid, &str, i32)]) -> OrderDetails {
        let request = CheckoutRequest {
            user_id: None,
            items: lines
                .iter()
                .map(|(product_id, size, quantity)| CheckoutItem {
                    product_id: *product_id,
                    size: (*size).to_string(),
                    quantity: *quantity,
                })
                .collect(),
        };
        self.state
            .services
            .checkout
            .place_order(request)
            .await
            .expect("place order")
    }

    /// A pending order for one unit of a fresh product, pinned to
    /// `gateway_order_id`
    pub async fn pending_order_with_gateway_id(&self, gateway_order_id: &str) -> order::Model {
        let product = self.seed_product("Linen Shirt", dec!(499), &[("M", 10)]).await;
        let details = self.place_order(&[(product.id, "M", 1)]).await;
        let assigned = self
            .orders()
            .assign_gateway_order_id(details.order.id, gateway_order_id)
            .await
            .expect("assign gateway order id");
        assert!(assigned, "fresh order accepts a gateway order id");
        self.order(details.order.id).await
    }

    pub async fn order(&self, id: Uuid) -> order::Model {
        self.orders().get(id).await.expect("load order")
    }

    /// Overwrites payment columns directly, bypassing the guarded transitions
    pub async fn force_payment_state(
        &self,
        id: Uuid,
        status: order::PaymentStatus,
        payment_id: Option<&str>,
    ) -> order::Model {
        let current = order::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("load order")
            .expect("order exists");
        let mut active: order::ActiveModel = current.into();
        active.payment_status = Set(status);
        active.payment_id = Set(payment_id.map(str::to_string));
        active
            .update(self.state.db.as_ref())
            .await
            .expect("force payment state")
    }

    /// Serves `GET /payments/{id}` from the mock gateway
    pub async fn mock_payment(&self, payment_id: &str, amount_minor: i64, status: &str, order_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/payments/{payment_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": payment_id,
                "entity": "payment",
                "amount": amount_minor,
                "currency": "INR",
                "status": status,
                "method": "upi",
                "order_id": order_id
            })))
            .mount(&self.gateway)
            .await;
    }

    pub fn sign_payment(&self, gateway_order_id: &str, payment_id: &str) -> String {
        self.secrets.sign_payment(gateway_order_id, payment_id)
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Total of an order in minor units; SQLite round-trips decimals lossily
pub fn minor(amount: Decimal) -> i64 {
    storefront_api::gateway::to_minor_units(amount).expect("amount fits in i64")
}

/// Webhook body for a payment event
pub fn payment_event(
    event: &str,
    payment_id: &str,
    gateway_order_id: &str,
    status: &str,
    amount_minor: i64,
) -> String {
    json!({
        "entity": "event",
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "status": status,
                    "amount": amount_minor,
                    "currency": "INR"
                }
            }
        }
    })
    .to_string()
}
