//! Accounts, sessions and visitor identity.
//!
//! A visitor is recognised by a signed `sessionid` cookie (registered users)
//! or by the `device` cookie the storefront hands out to guests.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::domain::aggregates::{Customer, User};
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const DEVICE_COOKIE: &str = "device";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Password hashing failed: {0}")]
    Hash(String),
    #[error("Invalid session: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::internal(e.to_string()))
}

pub async fn verify_password_blocking(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

/// Issues and checks HS256 session tokens.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(settings: &Settings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret_key.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret_key.as_bytes()),
            ttl: Duration::hours(settings.session_ttl_hours),
            secure: settings.secure_cookies,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims { sub: user_id, iat: now.timestamp(), exp: (now + self.ttl).timestamp() };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        Ok(decode::<SessionClaims>(token, &self.decoding, &Validation::default())?.claims.sub)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token)).path("/").http_only(true).secure(self.secure).same_site(SameSite::Lax).build()
    }

    pub fn device_cookie(&self, device: String) -> Cookie<'static> {
        Cookie::build((DEVICE_COOKIE, device)).path("/").secure(self.secure).same_site(SameSite::Lax).permanent().build()
    }

    pub fn expired_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, "")).path("/").build()
    }
}

/// Who is making the request.
#[derive(Clone, Debug, Default)]
pub struct Visitor {
    pub user: Option<User>,
    pub customer: Option<Customer>,
    pub device: Option<String>,
}

impl Visitor {
    pub fn is_authenticated(&self) -> bool { self.user.is_some() }

    pub fn owns(&self, customer_id: Uuid) -> bool {
        self.customer.as_ref().is_some_and(|c| c.id == customer_id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Visitor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let device = jar.get(DEVICE_COOKIE).map(|c| c.value().to_string()).filter(|v| !v.is_empty());

        let user_id = jar.get(SESSION_COOKIE).and_then(|c| match state.sessions.verify(c.value()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring session cookie");
                None
            }
        });
        let user = match user_id {
            Some(id) => state.store.user_by_id(id).await?,
            None => None,
        };

        let customer = match (&user, &device) {
            (Some(u), _) => state.store.customer_by_user(u.id).await?,
            (None, Some(d)) => state.store.customer_by_device(d).await?,
            (None, None) => None,
        };
        Ok(Self { user, customer, device })
    }
}
