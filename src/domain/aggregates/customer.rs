//! Customer and account aggregates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whoever owns a cart: a registered account or a guest known by device cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub device: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Customer {
    pub fn guest(device: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), user_id: None, device: Some(device.into()), name: None, email: None }
    }

    pub fn for_user(user: &User) -> Self {
        Self { id: Uuid::now_v7(), user_id: Some(user.id), device: None, name: Some(user.username.clone()), email: Some(user.email.clone()) }
    }

    pub fn is_guest(&self) -> bool { self.user_id.is_none() }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), username: username.into(), email: email.into(), password_hash: password_hash.into(), date_joined: Utc::now() }
    }
}
