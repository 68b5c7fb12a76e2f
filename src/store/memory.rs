use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::domain::aggregates::{Coupon, Customer, Order, Product, User};
use crate::domain::value_objects::TransactionId;

#[derive(Default)]
struct Tables {
    customers: HashMap<Uuid, Customer>,
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
}

/// Process-local store with the same guarantees as the PostgreSQL schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_product(&self, product: Product) {
        self.tables.write().await.products.insert(product.id, product);
    }

    pub async fn insert_coupon(&self, coupon: Coupon) {
        self.tables.write().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> { Ok(()) }

    async fn customer_by_device(&self, device: &str) -> StoreResult<Option<Customer>> {
        let t = self.tables.read().await;
        Ok(t.customers.values().find(|c| c.device.as_deref() == Some(device)).cloned())
    }

    async fn customer_for_device(&self, device: &str) -> StoreResult<Customer> {
        let mut t = self.tables.write().await;
        if let Some(c) = t.customers.values().find(|c| c.device.as_deref() == Some(device)) {
            return Ok(c.clone());
        }
        let customer = Customer::guest(device);
        t.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn customer_by_user(&self, user_id: Uuid) -> StoreResult<Option<Customer>> {
        let t = self.tables.read().await;
        Ok(t.customers.values().find(|c| c.user_id == Some(user_id)).cloned())
    }

    async fn create_user(&self, user: &User) -> StoreResult<Customer> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!("username {} is taken", user.username)));
        }
        let customer = Customer::for_user(user);
        t.users.insert(user.id, user.clone());
        t.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let mut products: Vec<Product> = self.tables.read().await.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let t = self.tables.read().await;
        Ok(t.coupons.values().find(|c| c.code.eq_ignore_ascii_case(code)).cloned())
    }

    async fn open_order(&self, customer_id: Uuid) -> StoreResult<Option<Order>> {
        let t = self.tables.read().await;
        Ok(t.orders.values().filter(|o| o.customer_id == customer_id && !o.complete).max_by_key(|o| o.date_ordered).cloned())
    }

    async fn order_by_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Order>> {
        let t = self.tables.read().await;
        Ok(t.orders.values().find(|o| o.transaction_id == transaction_id).cloned())
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.orders.get(&order.id).is_some_and(|stored| stored.complete) {
            return Err(StoreError::Conflict(format!("order {} is already complete", order.transaction_id)));
        }
        if !order.complete && t.orders.values().any(|o| o.customer_id == order.customer_id && !o.complete && o.id != order.id) {
            return Err(StoreError::Conflict("customer already has an open order".to_string()));
        }
        let mut stored = order.clone();
        stored.events.clear();
        t.orders.insert(stored.id, stored);
        Ok(())
    }

    async fn completed_orders(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t.orders.values().filter(|o| o.customer_id == customer_id && o.complete).cloned().collect();
        orders.sort_by(|a, b| b.date_modified.cmp(&a.date_modified));
        Ok(orders)
    }
}
