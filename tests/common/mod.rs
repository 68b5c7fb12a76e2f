#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use pizza_delivery::domain::aggregates::{Order, Product};
use pizza_delivery::domain::value_objects::{Money, TransactionId};
use pizza_delivery::payments::{DisabledGateway, DynPaymentGateway, HostedCheckout, HostedSession, PaymentError, PaymentEvent, PaymentGateway};
use pizza_delivery::publisher::EventPublisher;
use pizza_delivery::store::{MemoryStore, Store};
use pizza_delivery::{router, AppState, Settings};

pub const DEVICE: &str = "TestDeviceId";
pub const DEVICE_COOKIE: &str = "device=TestDeviceId";
pub const WEBHOOK_SIGNATURE: &str = "t=1,v1=test";

/// Records every hosted checkout and accepts webhooks signed with [`WEBHOOK_SIGNATURE`].
#[derive(Default)]
pub struct FakeGateway {
    pub sessions: Mutex<Vec<HostedCheckout>>,
}

impl FakeGateway {
    pub fn last_session(&self) -> Option<HostedCheckout> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, checkout: HostedCheckout) -> Result<HostedSession, PaymentError> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push(checkout);
        Ok(HostedSession { id: format!("cs_test_{}", sessions.len()), url: Some("https://checkout.test/pay".to_string()) })
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent, PaymentError> {
        if signature != WEBHOOK_SIGNATURE {
            return Err(PaymentError::InvalidWebhook("bad signature".to_string()));
        }
        let value: Value = serde_json::from_str(payload).map_err(|e| PaymentError::InvalidWebhook(e.to_string()))?;
        let transaction_id: TransactionId = value["transaction_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| PaymentError::InvalidWebhook("missing transaction_id".to_string()))?;
        Ok(PaymentEvent::CheckoutCompleted { transaction_id, paid: value["paid"].as_bool().unwrap_or(false) })
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> &str {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default()
    }

    /// `name=value` of a cookie set by the response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{name}=")))
            .map(str::to_string)
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub product: Product,
    pub product_with_variant: Product,
}

impl TestApp {
    pub async fn new() -> Self {
        let gateway = Arc::new(FakeGateway::default());
        Self::build(gateway.clone(), gateway).await
    }

    pub async fn without_card_payments() -> Self {
        Self::build(Arc::new(DisabledGateway), Arc::new(FakeGateway::default())).await
    }

    async fn build(payments: DynPaymentGateway, gateway: Arc<FakeGateway>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let product = Product::create("Test Product", Some(Money::usd(Decimal::new(15, 0))));
        let product_with_variant = Product::create("Test Product with Variant", None)
            .with_variant("Test Variant 1", Some("Test Size 1"), Money::usd(Decimal::new(10, 0)))
            .with_variant("Test Variant 2", Some("Test Size 2"), Money::usd(Decimal::new(20, 0)));
        store.insert_product(product.clone()).await;
        store.insert_product(product_with_variant.clone()).await;

        let state = AppState::new(Settings::for_tests(), store.clone(), payments, EventPublisher::disabled());
        Self { router: router(state), store, gateway, product, product_with_variant }
    }

    /// Open order for the test device: ten of the plain product and ten of each variant.
    pub async fn guest_order(&self) -> Order {
        let customer = self.store.customer_for_device(DEVICE).await.unwrap();
        let mut order = Order::create(customer.id, "usd");
        order.change_item(&self.product, None, 10).unwrap();
        for variant in &self.product_with_variant.variants {
            order.change_item(&self.product_with_variant, Some(variant.id), 10).unwrap();
        }
        self.store.save_order(&order).await.unwrap();
        order
    }

    pub async fn order(&self, transaction_id: TransactionId) -> Order {
        self.store.order_by_transaction(transaction_id).await.unwrap().unwrap()
    }

    pub async fn request(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, cookie, Some(body)).await
    }
}
