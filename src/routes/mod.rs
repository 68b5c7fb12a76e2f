//! HTTP surface.

use axum::{
    extract::{FromRequest, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::state::AppState;

mod checkout;
mod store;
mod users;

pub const PRODUCTS_URL: &str = "/store/products";
pub const CHECKOUT_URL: &str = "/order/checkout";
pub const SUCCESS_URL: &str = "/order/success";
pub const LOGIN_URL: &str = "/users/login";
pub const MY_ORDERS_URL: &str = "/users/my-orders";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/store/products", get(store::list_products))
        .route("/store/products/:id", get(store::get_product))
        .route("/store/update-item", post(store::update_item))
        .route("/order/checkout", get(checkout::checkout_page))
        .route("/order/apply-coupon", post(checkout::apply_coupon))
        .route("/order/cash-checkout/:transaction_id", post(checkout::cash_checkout))
        .route("/order/api/checkout-session/:transaction_id", post(checkout::card_checkout))
        .route("/order/success", get(checkout::success))
        .route("/order/webhook/stripe", post(checkout::stripe_webhook))
        .route("/users/register", get(users::register_form).post(users::register))
        .route("/users/login", get(users::login_form).post(users::login))
        .route("/users/logout", get(users::logout))
        .route("/users/my-orders", get(users::my_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(s): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    s.store.ping().await?;
    Ok(Json(serde_json::json!({"status": "healthy", "service": "pizza-delivery"})))
}

/// `Json` whose rejections render as `ApiError`.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub(crate) struct JsonBody<T>(pub T);

/// `302 Found` to a local path.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Only same-site absolute paths are followed after login.
pub(crate) fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/users/my-orders")), Some("/users/my-orders"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_found_sets_location() {
        let res = found(CHECKOUT_URL);
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], CHECKOUT_URL);
    }
}
