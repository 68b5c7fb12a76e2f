use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::domain::aggregates::{
    Coupon, Customer, DiscountType, Fulfilment, Order, OrderItem, PaymentMethod, PickUpDetail, Product,
    ProductVariant, ShippingAddress, Urgency, User,
};
use crate::domain::value_objects::{Money, TransactionId};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow { id: Uuid, user_id: Option<Uuid>, device: Option<String>, name: Option<String>, email: Option<String> }

#[derive(Debug, sqlx::FromRow)]
struct UserRow { id: Uuid, username: String, email: String, password_hash: String, date_joined: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, description: Option<String>, price: Option<Decimal>, currency: String, image_url: Option<String>, created_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct VariantRow { id: Uuid, product_id: Uuid, title: String, size: Option<String>, price: Decimal, currency: String }

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid, code: String, active: bool, discount_type: String, discount_amount: Decimal,
    valid_from: DateTime<Utc>, valid_to: DateTime<Utc>, stripe_coupon_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: Uuid, transaction_id: Uuid, currency: String, complete: bool, coupon_id: Option<Uuid>,
    payment_method: Option<String>, date_ordered: DateTime<Utc>, date_modified: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid, product_id: Uuid, product_name: String, product_price: Option<Decimal>, product_currency: String,
    variant_id: Option<Uuid>, variant_title: Option<String>, variant_size: Option<String>, variant_price: Option<Decimal>,
    variant_currency: Option<String>, quantity: i32, date_added: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingRow {
    email: String, phone: String, first_name: String, last_name: String, address_1: String, address_2: Option<String>,
    city: String, state: String, zipcode: Option<String>, country: String,
}

#[derive(Debug, sqlx::FromRow)]
struct PickupRow { email: String, phone: String, urgency: String, pickup_date: Option<NaiveDateTime> }

impl From<CustomerRow> for Customer {
    fn from(r: CustomerRow) -> Self { Customer { id: r.id, user_id: r.user_id, device: r.device, name: r.name, email: r.email } }
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self { User { id: r.id, username: r.username, email: r.email, password_hash: r.password_hash, date_joined: r.date_joined } }
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let discount_type = DiscountType::parse(&r.discount_type)
            .ok_or_else(|| StoreError::Corrupt(format!("coupon {} has discount type {}", r.code, r.discount_type)))?;
        Ok(Coupon {
            id: r.id, code: r.code, active: r.active, discount_type, discount_amount: r.discount_amount,
            valid_from: r.valid_from, valid_to: r.valid_to, stripe_coupon_id: r.stripe_coupon_id,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, transaction_id, currency, complete, coupon_id, payment_method, date_ordered, date_modified";

/// PostgreSQL backend. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore { db: PgPool }

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    async fn variants_for(&self, product_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<ProductVariant>>> {
        let rows = sqlx::query_as::<_, VariantRow>("SELECT id, product_id, title, size, price, currency FROM product_variants WHERE product_id = ANY($1) ORDER BY price, title")
            .bind(product_ids).fetch_all(&self.db).await?;
        let mut out: HashMap<Uuid, Vec<ProductVariant>> = HashMap::new();
        for r in rows {
            out.entry(r.product_id).or_default().push(ProductVariant { id: r.id, product_id: r.product_id, title: r.title, size: r.size, price: Money::new(r.price, &r.currency) });
        }
        Ok(out)
    }

    async fn hydrate(&self, row: OrderRow) -> StoreResult<Order> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT oi.id, oi.product_id, p.name AS product_name, p.price AS product_price, p.currency AS product_currency, \
             v.id AS variant_id, v.title AS variant_title, v.size AS variant_size, v.price AS variant_price, v.currency AS variant_currency, \
             oi.quantity, oi.date_added \
             FROM order_items oi JOIN products p ON p.id = oi.product_id LEFT JOIN product_variants v ON v.id = oi.variant_id \
             WHERE oi.order_id = $1 ORDER BY oi.date_added")
            .bind(row.id).fetch_all(&self.db).await?
            .into_iter().map(|i| OrderItem {
                id: i.id,
                product_id: i.product_id,
                product_name: i.product_name,
                product_price: i.product_price.map(|p| Money::new(p, &i.product_currency)),
                variant: match (i.variant_id, i.variant_title, i.variant_price) {
                    (Some(id), Some(title), Some(price)) => Some(ProductVariant {
                        id, product_id: i.product_id, title, size: i.variant_size,
                        price: Money::new(price, i.variant_currency.as_deref().unwrap_or(&i.product_currency)),
                    }),
                    _ => None,
                },
                quantity: u32::try_from(i.quantity).unwrap_or(0),
                date_added: i.date_added,
            }).collect();

        let coupon = match row.coupon_id {
            Some(id) => sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE id = $1")
                .bind(id).fetch_optional(&self.db).await?.map(Coupon::try_from).transpose()?,
            None => None,
        };

        let shipping = sqlx::query_as::<_, ShippingRow>("SELECT email, phone, first_name, last_name, address_1, address_2, city, state, zipcode, country FROM shipping_addresses WHERE order_id = $1")
            .bind(row.id).fetch_optional(&self.db).await?;
        let fulfilment = match shipping {
            Some(s) => Some(Fulfilment::Delivery(ShippingAddress {
                email: s.email, phone: s.phone, first_name: s.first_name, last_name: s.last_name, address_1: s.address_1,
                address_2: s.address_2, city: s.city, state: s.state, zipcode: s.zipcode, country: s.country,
            })),
            None => match sqlx::query_as::<_, PickupRow>("SELECT email, phone, urgency, pickup_date FROM pickup_details WHERE order_id = $1")
                .bind(row.id).fetch_optional(&self.db).await? {
                Some(p) => {
                    let urgency = Urgency::parse(&p.urgency).ok_or_else(|| StoreError::Corrupt(format!("pickup urgency {}", p.urgency)))?;
                    Some(Fulfilment::CarryOut(PickUpDetail { email: p.email, phone: p.phone, urgency, pickup_date: p.pickup_date }))
                }
                None => None,
            },
        };

        let payment_method = match row.payment_method.as_deref() {
            Some(m) => Some(PaymentMethod::parse(m).ok_or_else(|| StoreError::Corrupt(format!("payment method {m}")))?),
            None => None,
        };

        Ok(Order {
            id: row.id, customer_id: row.customer_id, transaction_id: TransactionId::from_uuid(row.transaction_id),
            currency: row.currency, complete: row.complete, items, coupon, fulfilment, payment_method,
            date_ordered: row.date_ordered, date_modified: row.date_modified, events: vec![],
        })
    }

    async fn write_fulfilment(tx: &mut Transaction<'_, Postgres>, order: &Order) -> StoreResult<()> {
        sqlx::query("DELETE FROM shipping_addresses WHERE order_id = $1").bind(order.id).execute(&mut **tx).await?;
        sqlx::query("DELETE FROM pickup_details WHERE order_id = $1").bind(order.id).execute(&mut **tx).await?;
        match &order.fulfilment {
            Some(Fulfilment::Delivery(a)) => {
                sqlx::query("INSERT INTO shipping_addresses (order_id, email, phone, first_name, last_name, address_1, address_2, city, state, zipcode, country, date_added) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())")
                    .bind(order.id).bind(&a.email).bind(&a.phone).bind(&a.first_name).bind(&a.last_name).bind(&a.address_1)
                    .bind(&a.address_2).bind(&a.city).bind(&a.state).bind(&a.zipcode).bind(&a.country)
                    .execute(&mut **tx).await?;
            }
            Some(Fulfilment::CarryOut(p)) => {
                sqlx::query("INSERT INTO pickup_details (order_id, email, phone, urgency, pickup_date, date_added) VALUES ($1, $2, $3, $4, $5, NOW())")
                    .bind(order.id).bind(&p.email).bind(&p.phone).bind(p.urgency.as_str()).bind(p.pickup_date)
                    .execute(&mut **tx).await?;
            }
            None => {}
        }
        Ok(())
    }
}

fn conflict_on_unique(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what.to_string()),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn customer_by_device(&self, device: &str) -> StoreResult<Option<Customer>> {
        Ok(sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE device = $1").bind(device).fetch_optional(&self.db).await?.map(Customer::from))
    }

    async fn customer_for_device(&self, device: &str) -> StoreResult<Customer> {
        sqlx::query("INSERT INTO customers (id, device) VALUES ($1, $2) ON CONFLICT (device) DO NOTHING")
            .bind(Uuid::now_v7()).bind(device).execute(&self.db).await?;
        let row = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE device = $1").bind(device).fetch_one(&self.db).await?;
        Ok(row.into())
    }

    async fn customer_by_user(&self, user_id: Uuid) -> StoreResult<Option<Customer>> {
        Ok(sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE user_id = $1").bind(user_id).fetch_optional(&self.db).await?.map(Customer::from))
    }

    async fn create_user(&self, user: &User) -> StoreResult<Customer> {
        let mut tx = self.db.begin().await?;
        sqlx::query("INSERT INTO users (id, username, email, password_hash, date_joined) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id).bind(&user.username).bind(&user.email).bind(&user.password_hash).bind(user.date_joined)
            .execute(&mut *tx).await.map_err(|e| conflict_on_unique(e, "username is taken"))?;
        let customer = Customer::for_user(user);
        sqlx::query("INSERT INTO customers (id, user_id, name, email) VALUES ($1, $2, $3, $4)")
            .bind(customer.id).bind(customer.user_id).bind(&customer.name).bind(&customer.email)
            .execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(customer)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1").bind(username).fetch_optional(&self.db).await?.map(User::from))
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.db).await?.map(User::from))
    }

    async fn products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>("SELECT id, name, description, price, currency, image_url, created_at FROM products ORDER BY name")
            .fetch_all(&self.db).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut variants = self.variants_for(&ids).await?;
        Ok(rows.into_iter().map(|r| Product {
            id: r.id, name: r.name, description: r.description, price: r.price.map(|p| Money::new(p, &r.currency)),
            image_url: r.image_url, variants: variants.remove(&r.id).unwrap_or_default(), created_at: r.created_at,
        }).collect())
    }

    async fn product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let Some(r) = sqlx::query_as::<_, ProductRow>("SELECT id, name, description, price, currency, image_url, created_at FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.db).await? else { return Ok(None) };
        let variants = self.variants_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(Product {
            id: r.id, name: r.name, description: r.description, price: r.price.map(|p| Money::new(p, &r.currency)),
            image_url: r.image_url, variants, created_at: r.created_at,
        }))
    }

    async fn coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE LOWER(code) = LOWER($1)")
            .bind(code).fetch_optional(&self.db).await?.map(Coupon::try_from).transpose()
    }

    async fn open_order(&self, customer_id: Uuid) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND complete = FALSE ORDER BY date_ordered DESC LIMIT 1"))
            .bind(customer_id).fetch_optional(&self.db).await?;
        match row { Some(r) => Ok(Some(self.hydrate(r).await?)), None => Ok(None) }
    }

    async fn order_by_transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE transaction_id = $1"))
            .bind(transaction_id.as_uuid()).fetch_optional(&self.db).await?;
        match row { Some(r) => Ok(Some(self.hydrate(r).await?)), None => Ok(None) }
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let written = sqlx::query(
            "INSERT INTO orders (id, customer_id, transaction_id, currency, complete, coupon_id, payment_method, date_ordered, date_modified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET complete = EXCLUDED.complete, coupon_id = EXCLUDED.coupon_id, \
             payment_method = EXCLUDED.payment_method, date_modified = EXCLUDED.date_modified \
             WHERE orders.complete = FALSE")
            .bind(order.id).bind(order.customer_id).bind(order.transaction_id.as_uuid()).bind(&order.currency)
            .bind(order.complete).bind(order.coupon.as_ref().map(|c| c.id)).bind(order.payment_method.map(|m| m.as_str()))
            .bind(order.date_ordered).bind(order.date_modified)
            .execute(&mut *tx).await.map_err(|e| conflict_on_unique(e, "customer already has an open order"))?;
        if written.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("order {} is already complete", order.transaction_id)));
        }

        sqlx::query("DELETE FROM order_items WHERE order_id = $1").bind(order.id).execute(&mut *tx).await?;
        for item in &order.items {
            sqlx::query("INSERT INTO order_items (id, order_id, product_id, variant_id, quantity, date_added) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(item.id).bind(order.id).bind(item.product_id).bind(item.variant_id())
                .bind(i32::try_from(item.quantity).unwrap_or(i32::MAX)).bind(item.date_added)
                .execute(&mut *tx).await?;
        }
        Self::write_fulfilment(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn completed_orders(&self, customer_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND complete = TRUE ORDER BY date_modified DESC"))
            .bind(customer_id).fetch_all(&self.db).await?;
        let mut orders = Vec::with_capacity(rows.len());
        for r in rows { orders.push(self.hydrate(r).await?); }
        Ok(orders)
    }
}
