//! Persistence seam.
//!
//! Handlers talk to a [`Store`] trait object. [`PgStore`] is the production
//! backend; [`MemoryStore`] backs the test suite and local demos.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, Customer, Order, Product, User};
use crate::domain::value_objects::TransactionId;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule or the completed-order guard rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn customer_by_device(&self, device: &str) -> StoreResult<Option<Customer>>;
    /// Returns the guest customer for `device`, creating it on first sight.
    async fn customer_for_device(&self, device: &str) -> StoreResult<Customer>;
    async fn customer_by_user(&self, user_id: Uuid) -> StoreResult<Option<Customer>>;

    /// Inserts the account together with its customer record.
    async fn create_user(&self, user: &User) -> StoreResult<Customer>;
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn products(&self) -> StoreResult<Vec<Product>>;
    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Case-insensitive lookup.
    async fn coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn open_order(&self, customer_id: Uuid) -> StoreResult<Option<Order>>;
    async fn order_by_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Order>>;
    /// Persists the aggregate. Fails with [`StoreError::Conflict`] when the stored
    /// order is already complete, so a completed order is never overwritten.
    async fn save_order(&self, order: &Order) -> StoreResult<()>;
    /// Completed orders of a customer, most recently modified first.
    async fn completed_orders(&self, customer_id: Uuid) -> StoreResult<Vec<Order>>;
}

pub type DynStore = Arc<dyn Store>;
