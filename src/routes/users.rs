//! Registration, login and order history.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password_blocking, verify_password_blocking, Visitor};
use crate::domain::aggregates::{OrderSummary, User};
use crate::error::ApiError;
use crate::forms::{FieldSpec, LoginForm, RegisterForm, LOGIN_FORM, NON_FIELD_ERRORS, REGISTER_FORM};
use crate::state::AppState;
use crate::store::StoreError;

use super::{found, JsonBody, safe_next, LOGIN_URL, MY_ORDERS_URL, PRODUCTS_URL};

const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const BAD_CREDENTIALS: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Serialize)]
pub struct FormPage {
    pub form: &'static [FieldSpec],
}

#[derive(Debug, Deserialize)]
pub struct NextParams {
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderHistory {
    pub orders: Vec<OrderSummary>,
}

pub async fn register_form() -> Json<FormPage> { Json(FormPage { form: REGISTER_FORM }) }

#[tracing::instrument(name = "POST /users/register", skip(state, form))]
pub async fn register(State(state): State<AppState>, JsonBody(form): JsonBody<RegisterForm>) -> Result<Response, ApiError> {
    let registration = form.clean()?;
    if state.store.user_by_username(&registration.username).await?.is_some() {
        return Err(ApiError::invalid("username", DUPLICATE_USERNAME));
    }
    let hash = hash_password_blocking(registration.password).await?;
    let user = User::new(registration.username, registration.email, hash);
    match state.store.create_user(&user).await {
        Ok(_) => {}
        // Lost a race with a concurrent registration.
        Err(StoreError::Conflict(_)) => return Err(ApiError::invalid("username", DUPLICATE_USERNAME)),
        Err(e) => return Err(e.into()),
    }
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(found(LOGIN_URL))
}

pub async fn login_form(visitor: Visitor) -> Response {
    if visitor.is_authenticated() {
        return found(PRODUCTS_URL);
    }
    Json(FormPage { form: LOGIN_FORM }).into_response()
}

#[tracing::instrument(name = "POST /users/login", skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<NextParams>,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<(CookieJar, Response), ApiError> {
    let (username, password) = form.clean()?;
    let user = state.store.user_by_username(&username).await?;
    let verified = match &user {
        Some(u) => verify_password_blocking(password, u.password_hash.clone()).await?,
        None => false,
    };
    let user = match user {
        Some(u) if verified => u,
        _ => {
            tracing::info!(%username, "Failed login");
            return Err(ApiError::invalid(NON_FIELD_ERRORS, BAD_CREDENTIALS));
        }
    };

    let token = state.sessions.issue(user.id).map_err(|e| ApiError::internal(e.to_string()))?;
    tracing::info!(user_id = %user.id, "User logged in");
    let next = safe_next(params.next.as_deref()).unwrap_or(PRODUCTS_URL);
    Ok((jar.add(state.sessions.session_cookie(token)), found(next)))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Response) {
    (jar.remove(state.sessions.expired_session_cookie()), found(PRODUCTS_URL))
}

#[tracing::instrument(name = "GET /users/my-orders", skip(state, visitor))]
pub async fn my_orders(State(state): State<AppState>, visitor: Visitor) -> Result<Response, ApiError> {
    if !visitor.is_authenticated() {
        return Ok(found(&format!("{LOGIN_URL}?next={MY_ORDERS_URL}")));
    }
    let orders = match &visitor.customer {
        Some(c) => state.store.completed_orders(c.id).await?,
        None => Vec::new(),
    };
    let now = Utc::now();
    Ok(Json(OrderHistory { orders: orders.iter().map(|o| o.summary(now)).collect() }).into_response())
}
