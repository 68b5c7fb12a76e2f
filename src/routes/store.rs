//! Catalog and cart.

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Visitor;
use crate::domain::aggregates::{Customer, Order, Product};
use crate::error::ApiError;
use crate::state::AppState;

use super::JsonBody;

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub cart_items: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    Add,
    Remove,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub action: CartAction,
}

#[derive(Debug, Serialize)]
pub struct UpdateItemResponse {
    pub quantity: u32,
    pub cart_items: u32,
}

/// The visitor's in-progress order, if any.
pub(super) async fn open_order_for(state: &AppState, visitor: &Visitor) -> Result<Option<Order>, ApiError> {
    match &visitor.customer {
        Some(c) => Ok(state.store.open_order(c.id).await?),
        None => Ok(None),
    }
}

/// Resolves the cart owner, registering a guest device when the visitor has none yet.
async fn cart_owner(state: &AppState, visitor: Visitor, jar: CookieJar) -> Result<(Customer, CookieJar), ApiError> {
    if let Some(customer) = visitor.customer {
        return Ok((customer, jar));
    }
    if let Some(user) = visitor.user {
        return Err(ApiError::internal(format!("user {} has no customer record", user.id)));
    }
    let (device, jar) = match visitor.device {
        Some(d) => (d, jar),
        None => {
            let d = Uuid::new_v4().to_string();
            let jar = jar.add(state.sessions.device_cookie(d.clone()));
            (d, jar)
        }
    };
    Ok((state.store.customer_for_device(&device).await?, jar))
}

#[tracing::instrument(name = "GET /store/products", skip(state, visitor))]
pub async fn list_products(State(state): State<AppState>, visitor: Visitor) -> Result<Json<ProductList>, ApiError> {
    let products = state.store.products().await?;
    let cart_items = open_order_for(&state, &visitor).await?.map(|o| o.item_count()).unwrap_or(0);
    Ok(Json(ProductList { products, cart_items }))
}

#[tracing::instrument(name = "GET /store/products/:id", skip(state))]
pub async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>, ApiError> {
    state.store.product(id).await?.map(Json).ok_or_else(|| ApiError::not_found("Product not found"))
}

#[tracing::instrument(name = "POST /store/update-item", skip(state, visitor, jar))]
pub async fn update_item(
    State(state): State<AppState>,
    visitor: Visitor,
    jar: CookieJar,
    JsonBody(req): JsonBody<UpdateItemRequest>,
) -> Result<(CookieJar, Json<UpdateItemResponse>), ApiError> {
    let product = state.store.product(req.product_id).await?.ok_or_else(|| ApiError::not_found("Product not found"))?;
    let (customer, jar) = cart_owner(&state, visitor, jar).await?;

    let (mut order, is_new) = match state.store.open_order(customer.id).await? {
        Some(order) => (order, false),
        None => (Order::create(customer.id, &state.settings.currency), true),
    };
    let delta = match req.action {
        CartAction::Add => 1,
        CartAction::Remove => -1,
    };
    let quantity = order.change_item(&product, req.variant_id, delta)?;
    if is_new && order.is_empty() {
        return Ok((jar, Json(UpdateItemResponse { quantity, cart_items: 0 })));
    }
    state.store.save_order(&order).await?;
    state.events.publish(order.take_events()).await;

    tracing::debug!(order_id = %order.id(), product_id = %product.id, quantity, "Cart updated");
    Ok((jar, Json(UpdateItemResponse { quantity, cart_items: order.item_count() })))
}
