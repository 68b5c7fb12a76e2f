//! Checkout: coupon entry, cash and card payment, and the gateway webhook.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::Visitor;
use crate::domain::aggregates::{Order, OrderSummary, PaymentMethod};
use crate::domain::value_objects::TransactionId;
use crate::error::ApiError;
use crate::forms::{CheckoutForm, CheckoutPayloadError, CouponForm, FieldSpec, COUPON_FORM};
use crate::payments::{HostedCheckout, PaymentEvent};
use crate::state::AppState;

use super::{found, JsonBody, store::open_order_for, CHECKOUT_URL, PRODUCTS_URL, SUCCESS_URL};

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct CheckoutPage {
    pub order: OrderSummary,
    pub coupon_form: &'static [FieldSpec],
    pub stripe_publishable_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    pub transaction_id: Option<String>,
}

fn success_path(transaction_id: TransactionId) -> String {
    format!("{SUCCESS_URL}?transaction_id={transaction_id}")
}

/// The order behind a checkout URL, visible only to its owner while it can still be paid for.
async fn checkout_order(state: &AppState, visitor: &Visitor, transaction_id: &str) -> Result<Order, ApiError> {
    let not_found = || ApiError::not_found("No open order matches this checkout");
    let transaction_id: TransactionId = transaction_id.parse().map_err(|_| not_found())?;
    let order = state.store.order_by_transaction(transaction_id).await?.ok_or_else(not_found)?;
    if !visitor.owns(order.customer_id()) || !order.is_checkout_eligible() {
        return Err(not_found());
    }
    Ok(order)
}

/// Validates the delivery or pickup body and attaches it to the order.
fn attach_fulfilment(order: &mut Order, body: &[u8]) -> Result<(), ApiError> {
    let form = CheckoutForm::parse(body).map_err(|e| match e {
        CheckoutPayloadError::Missing => ApiError::not_found("No checkout details were submitted"),
        CheckoutPayloadError::Invalid(errors) => ApiError::Validation(errors),
    })?;
    order.record_fulfilment(form.clean()?)?;
    Ok(())
}

#[tracing::instrument(name = "GET /order/checkout", skip(state, visitor))]
pub async fn checkout_page(State(state): State<AppState>, visitor: Visitor) -> Result<Response, ApiError> {
    let order = match open_order_for(&state, &visitor).await? {
        Some(order) if order.is_checkout_eligible() => order,
        _ => return Ok(found(PRODUCTS_URL)),
    };
    let page = CheckoutPage {
        order: order.summary(Utc::now()),
        coupon_form: COUPON_FORM,
        stripe_publishable_key: state.settings.stripe.publishable_key.clone(),
    };
    Ok(Json(page).into_response())
}

#[tracing::instrument(name = "POST /order/apply-coupon", skip(state, visitor))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    visitor: Visitor,
    JsonBody(form): JsonBody<CouponForm>,
) -> Result<Response, ApiError> {
    let mut order = match open_order_for(&state, &visitor).await? {
        Some(order) if order.is_checkout_eligible() => order,
        _ => return Ok(found(PRODUCTS_URL)),
    };
    let code = form.clean()?;
    let coupon = state.store.coupon_by_code(&code).await?.ok_or_else(|| ApiError::invalid("code", "Invalid coupon code."))?;
    order.apply_coupon(coupon, Utc::now())?;
    state.store.save_order(&order).await?;
    state.events.publish(order.take_events()).await;
    Ok(found(CHECKOUT_URL))
}

#[tracing::instrument(name = "POST /order/cash-checkout/:transaction_id", skip(state, visitor, body))]
pub async fn cash_checkout(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(transaction_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut order = checkout_order(&state, &visitor, &transaction_id).await?;
    attach_fulfilment(&mut order, &body)?;
    order.complete(PaymentMethod::Cash, Utc::now())?;
    state.store.save_order(&order).await?;
    state.events.publish(order.take_events()).await;

    tracing::info!(transaction_id = %order.transaction_id(), "Cash order placed");
    Ok(found(&success_path(order.transaction_id())))
}

#[tracing::instrument(name = "POST /order/api/checkout-session/:transaction_id", skip(state, visitor, body))]
pub async fn card_checkout(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(transaction_id): Path<String>,
    body: Bytes,
) -> Result<Json<CheckoutSessionResponse>, ApiError> {
    let mut order = checkout_order(&state, &visitor, &transaction_id).await?;
    attach_fulfilment(&mut order, &body)?;
    // Persisted before the gateway call so the webhook always finds the details.
    state.store.save_order(&order).await?;

    let checkout = HostedCheckout::for_order(
        &order,
        Utc::now(),
        state.settings.url(&success_path(order.transaction_id())),
        state.settings.url(CHECKOUT_URL),
    )?;
    let session = state.payments.create_checkout_session(checkout).await?;

    tracing::info!(transaction_id = %order.transaction_id(), session_id = %session.id, "Hosted checkout opened");
    Ok(Json(CheckoutSessionResponse { session_id: session.id, url: session.url }))
}

#[tracing::instrument(name = "GET /order/success", skip(state, visitor))]
pub async fn success(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(params): Query<SuccessParams>,
) -> Result<Json<OrderSummary>, ApiError> {
    let not_found = || ApiError::not_found("Order not found");
    let transaction_id: TransactionId = params.transaction_id.as_deref().ok_or_else(not_found)?.parse().map_err(|_| not_found())?;
    let order = state.store.order_by_transaction(transaction_id).await?.ok_or_else(not_found)?;
    if !visitor.owns(order.customer_id()) {
        return Err(not_found());
    }
    Ok(Json(order.summary(Utc::now())))
}

#[tracing::instrument(name = "POST /order/webhook/stripe", skip(state, headers, body))]
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing signature header".to_string()))?;
    let payload = std::str::from_utf8(&body).map_err(|_| ApiError::BadRequest("Payload is not UTF-8".to_string()))?;

    let (transaction_id, paid) = match state.payments.parse_webhook(payload, signature)? {
        PaymentEvent::CheckoutCompleted { transaction_id, paid } => (transaction_id, paid),
        PaymentEvent::Ignored(kind) => {
            tracing::debug!(%kind, "Ignoring webhook event");
            return Ok(Json(serde_json::json!({"received": true})));
        }
    };
    if !paid {
        tracing::info!(%transaction_id, "Checkout finished without payment");
        return Ok(Json(serde_json::json!({"received": true})));
    }

    let Some(mut order) = state.store.order_by_transaction(transaction_id).await? else {
        tracing::warn!(%transaction_id, "Payment for unknown order");
        return Ok(Json(serde_json::json!({"received": true})));
    };
    if order.is_complete() {
        return Ok(Json(serde_json::json!({"received": true})));
    }
    order.complete(PaymentMethod::Card, Utc::now())?;
    state.store.save_order(&order).await?;
    state.events.publish(order.take_events()).await;

    tracing::info!(%transaction_id, "Card order paid");
    Ok(Json(serde_json::json!({"received": true})))
}
