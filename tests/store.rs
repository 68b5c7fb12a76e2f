mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, DEVICE_COOKIE};
use pizza_delivery::store::Store;

#[tokio::test]
async fn products_are_listed_with_cart_size() {
    let app = TestApp::new().await;
    app.guest_order().await;

    let res = app.get("/store/products", Some(DEVICE_COOKIE)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["products"].as_array().unwrap().len(), 2);
    assert_eq!(res.body["cart_items"], 30);

    let anonymous = app.get("/store/products", None).await;
    assert_eq!(anonymous.body["cart_items"], 0);
}

#[tokio::test]
async fn product_detail_and_missing_product() {
    let app = TestApp::new().await;
    let res = app.get(&format!("/store/products/{}", app.product_with_variant.id), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["variants"].as_array().unwrap().len(), 2);

    let missing = app.get(&format!("/store/products/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn first_item_assigns_device_cookie() {
    let app = TestApp::new().await;
    let res = app.post("/store/update-item", None, json!({"product_id": app.product.id, "action": "add"})).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["quantity"], 1);

    let device = res.cookie("device").expect("guest gets a device cookie");
    let again = app.post("/store/update-item", Some(&device), json!({"product_id": app.product.id, "action": "add"})).await;
    assert_eq!(again.body["quantity"], 2);
    assert!(again.cookie("device").is_none());
    assert_eq!(app.store.order_count().await, 1);
}

#[tokio::test]
async fn removing_last_unit_drops_the_line() {
    let app = TestApp::new().await;
    let order = app.guest_order().await;
    let variant = app.product_with_variant.variants[0].id;

    let body = json!({"product_id": app.product_with_variant.id, "variant_id": variant, "action": "remove"});
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), body).await;
    assert_eq!(res.body["quantity"], 9);
    assert_eq!(res.body["cart_items"], 29);

    let customer = app.store.customer_by_device(common::DEVICE).await.unwrap().unwrap();
    let mut stored = app.store.open_order(customer.id).await.unwrap().unwrap();
    assert_eq!(stored.transaction_id(), order.transaction_id());
    stored.change_item(&app.product_with_variant, Some(variant), -8).unwrap();
    app.store.save_order(&stored).await.unwrap();

    let body = json!({"product_id": app.product_with_variant.id, "variant_id": variant, "action": "remove"});
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), body).await;
    assert_eq!(res.body["quantity"], 0);
    assert_eq!(app.order(order.transaction_id()).await.items().len(), 2);
}

#[tokio::test]
async fn removing_from_empty_cart_creates_no_order() {
    let app = TestApp::new().await;
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), json!({"product_id": app.product.id, "action": "remove"})).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["quantity"], 0);
    assert_eq!(res.body["cart_items"], 0);
    assert_eq!(app.store.order_count().await, 0);

    let checkout = app.get("/order/checkout", Some(DEVICE_COOKIE)).await;
    assert_eq!(checkout.status, StatusCode::FOUND);
}

#[tokio::test]
async fn malformed_cart_body_is_reported_as_json() {
    let app = TestApp::new().await;
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), json!({"product_id": "nope", "action": "add"})).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["__all__"].is_array());
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn sized_product_needs_a_variant() {
    let app = TestApp::new().await;
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), json!({"product_id": app.product_with_variant.id, "action": "add"})).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(res.body["errors"]["variant_id"].is_array());

    let unknown = json!({"product_id": app.product_with_variant.id, "variant_id": uuid::Uuid::new_v4(), "action": "add"});
    let res = app.post("/store/update-item", Some(DEVICE_COOKIE), unknown).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let res = app.get("/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
}
