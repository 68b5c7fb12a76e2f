//! Order Aggregate
//!
//! The in-progress order doubles as the customer's cart. Checkout finalizes it
//! exactly once; after that every mutating call fails with
//! [`OrderError::AlreadyComplete`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::coupon::{Coupon, CouponError};
use crate::domain::aggregates::product::{Product, ProductVariant};
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{Money, TransactionId};

#[derive(Clone, Debug)]
pub struct Order {
    pub(crate) id: Uuid,
    pub(crate) customer_id: Uuid,
    pub(crate) transaction_id: TransactionId,
    pub(crate) currency: String,
    pub(crate) complete: bool,
    pub(crate) items: Vec<OrderItem>,
    pub(crate) coupon: Option<Coupon>,
    pub(crate) fulfilment: Option<Fulfilment>,
    pub(crate) payment_method: Option<PaymentMethod>,
    pub(crate) date_ordered: DateTime<Utc>,
    pub(crate) date_modified: DateTime<Utc>,
    pub(crate) events: Vec<OrderEvent>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: Option<Money>,
    pub variant: Option<ProductVariant>,
    pub quantity: u32,
    pub date_added: DateTime<Utc>,
}

impl OrderItem {
    /// Variant price wins over the product's base price.
    pub fn unit_price(&self, currency: &str) -> Money {
        self.variant.as_ref().map(|v| v.price.clone())
            .or_else(|| self.product_price.clone())
            .unwrap_or_else(|| Money::zero(currency))
    }
    pub fn line_total(&self, currency: &str) -> Money { self.unit_price(currency).multiply(self.quantity) }
    pub fn variant_id(&self) -> Option<Uuid> { self.variant.as_ref().map(|v| v.id) }
    pub fn display_name(&self) -> String {
        match &self.variant {
            Some(v) => format!("{} ({})", self.product_name, v.title),
            None => self.product_name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fulfilment {
    Delivery(ShippingAddress),
    CarryOut(PickUpDetail),
}

impl Fulfilment {
    pub fn kind(&self) -> &'static str {
        match self { Self::Delivery(_) => "delivery", Self::CarryOut(_) => "carry_out" }
    }
    pub fn email(&self) -> &str {
        match self { Self::Delivery(a) => &a.email, Self::CarryOut(p) => &p.email }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub address_1: String,
    pub address_2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: Option<String>,
    pub country: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickUpDetail {
    pub email: String,
    pub phone: String,
    pub urgency: Urgency,
    pub pickup_date: Option<NaiveDateTime>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency { Asap, Custom }

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Asap => "asap", Self::Custom => "custom" }
    }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "asap" => Some(Self::Asap), "custom" => Some(Self::Custom), _ => None }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Cash, Card }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Cash => "cash", Self::Card => "card" }
    }
    pub fn parse(value: &str) -> Option<Self> {
        match value { "cash" => Some(Self::Cash), "card" => Some(Self::Card), _ => None }
    }
}

impl Order {
    pub fn create(customer_id: Uuid, currency: &str) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut order = Self {
            id, customer_id, transaction_id: TransactionId::generate(), currency: currency.to_lowercase(),
            complete: false, items: vec![], coupon: None, fulfilment: None, payment_method: None,
            date_ordered: now, date_modified: now, events: vec![],
        };
        order.raise_event(OrderEvent::Created { order_id: id, customer_id });
        order
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn customer_id(&self) -> Uuid { self.customer_id }
    pub fn transaction_id(&self) -> TransactionId { self.transaction_id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_complete(&self) -> bool { self.complete }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn coupon(&self) -> Option<&Coupon> { self.coupon.as_ref() }
    pub fn fulfilment(&self) -> Option<&Fulfilment> { self.fulfilment.as_ref() }
    pub fn payment_method(&self) -> Option<PaymentMethod> { self.payment_method }
    pub fn date_ordered(&self) -> DateTime<Utc> { self.date_ordered }
    pub fn date_modified(&self) -> DateTime<Utc> { self.date_modified }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    /// Checkout is only offered for an open order with at least one line.
    pub fn is_checkout_eligible(&self) -> bool { !self.complete && !self.items.is_empty() }

    pub fn subtotal(&self) -> Money {
        self.items.iter().fold(Money::zero(&self.currency), |acc, i| acc.add(&i.line_total(&self.currency)).unwrap_or(acc))
    }

    pub fn discount(&self, now: DateTime<Utc>) -> Money {
        let subtotal = self.subtotal();
        self.coupon.as_ref().map(|c| c.discount_on(&subtotal, now)).unwrap_or_else(|| Money::zero(&self.currency))
    }

    pub fn total(&self, now: DateTime<Utc>) -> Money { self.subtotal().saturating_sub(&self.discount(now)) }

    /// Adds `delta` (negative to remove) units of a product line and returns the line's new quantity.
    pub fn change_item(&mut self, product: &Product, variant_id: Option<Uuid>, delta: i32) -> Result<u32, OrderError> {
        self.ensure_open()?;
        let variant = match variant_id {
            Some(id) => Some(product.variant(id).cloned().ok_or(OrderError::UnknownVariant)?),
            None if product.has_variants() => return Err(OrderError::VariantRequired),
            None => None,
        };
        let position = self.items.iter().position(|i| i.product_id == product.id && i.variant_id() == variant_id);
        let current = position.map(|p| self.items[p].quantity).unwrap_or(0);
        let quantity = (i64::from(current) + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32;
        if quantity == current {
            return Ok(quantity);
        }
        match position {
            Some(p) if quantity == 0 => { self.items.remove(p); }
            Some(p) => self.items[p].quantity = quantity,
            None if quantity > 0 => self.items.push(OrderItem {
                id: Uuid::now_v7(), product_id: product.id, product_name: product.name.clone(),
                product_price: product.price.clone(), variant, quantity, date_added: Utc::now(),
            }),
            None => {}
        }
        self.touch();
        self.raise_event(OrderEvent::ItemChanged { order_id: self.id, product_id: product.id, variant_id, quantity });
        Ok(quantity)
    }

    pub fn apply_coupon(&mut self, coupon: Coupon, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        coupon.check(now)?;
        let code = coupon.code.clone();
        self.coupon = Some(coupon);
        self.touch();
        self.raise_event(OrderEvent::CouponApplied { order_id: self.id, code });
        Ok(())
    }

    /// Attaches validated delivery or pickup details without finalizing the order.
    pub fn record_fulfilment(&mut self, fulfilment: Fulfilment) -> Result<(), OrderError> {
        self.ensure_open()?;
        self.fulfilment = Some(fulfilment);
        self.touch();
        Ok(())
    }

    /// The only irreversible transition: in-progress to complete.
    pub fn complete(&mut self, method: PaymentMethod, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.ensure_open()?;
        if self.items.is_empty() { return Err(OrderError::NoItems); }
        let fulfilment = self.fulfilment.as_ref().ok_or(OrderError::MissingFulfilment)?.kind();
        self.complete = true;
        self.payment_method = Some(method);
        self.touch();
        self.raise_event(OrderEvent::Completed {
            order_id: self.id, transaction_id: self.transaction_id, payment_method: method.as_str().to_string(),
            fulfilment: fulfilment.to_string(), total: self.total(now).amount(),
        });
        Ok(())
    }

    pub fn summary(&self, now: DateTime<Utc>) -> OrderSummary {
        OrderSummary {
            transaction_id: self.transaction_id,
            complete: self.complete,
            items: self.items.iter().map(|i| OrderItemSummary {
                product_id: i.product_id, variant_id: i.variant_id(), name: i.display_name(), quantity: i.quantity,
                unit_price: i.unit_price(&self.currency), line_total: i.line_total(&self.currency),
            }).collect(),
            item_count: self.item_count(),
            subtotal: self.subtotal(),
            discount: self.discount(now),
            total: self.total(now),
            coupon: self.coupon.as_ref().map(|c| c.code.clone()),
            fulfilment: self.fulfilment.clone(),
            payment_method: self.payment_method,
            date_ordered: self.date_ordered,
            date_modified: self.date_modified,
        }
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self) { self.date_modified = Utc::now(); }
    fn ensure_open(&self) -> Result<(), OrderError> {
        if self.complete { Err(OrderError::AlreadyComplete) } else { Ok(()) }
    }
}

/// Read model returned by the checkout, success and order-history endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct OrderSummary {
    pub transaction_id: TransactionId,
    pub complete: bool,
    pub items: Vec<OrderItemSummary>,
    pub item_count: u32,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub coupon: Option<String>,
    pub fulfilment: Option<Fulfilment>,
    pub payment_method: Option<PaymentMethod>,
    pub date_ordered: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderItemSummary {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already complete")]
    AlreadyComplete,
    #[error("Order has no items")]
    NoItems,
    #[error("Order has no delivery or pickup details")]
    MissingFulfilment,
    #[error("A size must be chosen for this product")]
    VariantRequired,
    #[error("Variant does not belong to this product")]
    UnknownVariant,
    #[error(transparent)]
    Coupon(#[from] CouponError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::DiscountType;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn menu() -> (Product, Product) {
        let plain = Product::create("Test Product", Some(Money::usd(Decimal::new(15, 0))));
        let sized = Product::create("Test Product with Variant", None)
            .with_variant("Test Variant 1", Some("Test Size 1"), Money::usd(Decimal::new(10, 0)))
            .with_variant("Test Variant 2", Some("Test Size 2"), Money::usd(Decimal::new(20, 0)));
        (plain, sized)
    }

    fn pickup() -> Fulfilment {
        Fulfilment::CarryOut(PickUpDetail { email: "test@example.com".into(), phone: "12345678".into(), urgency: Urgency::Asap, pickup_date: None })
    }

    #[test]
    fn test_totals_use_variant_price() {
        let (plain, sized) = menu();
        let mut order = Order::create(Uuid::new_v4(), "usd");
        order.change_item(&plain, None, 10).unwrap();
        order.change_item(&sized, Some(sized.variants[0].id), 10).unwrap();
        order.change_item(&sized, Some(sized.variants[1].id), 10).unwrap();
        assert_eq!(order.item_count(), 30);
        assert_eq!(order.subtotal().amount(), Decimal::new(450, 0));
        assert!(order.is_checkout_eligible());
    }

    #[test]
    fn test_lines_merge_and_drop_at_zero() {
        let (plain, sized) = menu();
        let mut order = Order::create(Uuid::new_v4(), "usd");
        assert_eq!(order.change_item(&plain, None, 1).unwrap(), 1);
        assert_eq!(order.change_item(&plain, None, 1).unwrap(), 2);
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.change_item(&plain, None, -5).unwrap(), 0);
        assert!(order.is_empty());
        assert_eq!(order.change_item(&sized, None, 1), Err(OrderError::VariantRequired));
        assert_eq!(order.change_item(&sized, Some(Uuid::new_v4()), 1), Err(OrderError::UnknownVariant));
    }

    #[test]
    fn test_removing_absent_line_changes_nothing() {
        let (plain, _) = menu();
        let mut order = Order::create(Uuid::new_v4(), "usd");
        order.take_events();
        let modified = order.date_modified();
        assert_eq!(order.change_item(&plain, None, -1).unwrap(), 0);
        assert!(order.is_empty());
        assert_eq!(order.date_modified(), modified);
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_coupon_discount_applies_to_total() {
        let (plain, _) = menu();
        let mut order = Order::create(Uuid::new_v4(), "usd");
        order.change_item(&plain, None, 2).unwrap();
        let now = Utc::now();
        let coupon = Coupon::new("winter", DiscountType::Percent, Decimal::new(50, 0), now - Duration::hours(1), now + Duration::days(1));
        order.apply_coupon(coupon, now).unwrap();
        assert_eq!(order.total(now).amount(), Decimal::new(15, 0));
        assert_eq!(order.total(now + Duration::days(3)).amount(), Decimal::new(30, 0));
    }

    #[test]
    fn test_expired_coupon_rejected() {
        let mut order = Order::create(Uuid::new_v4(), "usd");
        let now = Utc::now();
        let coupon = Coupon::new("old", DiscountType::Fixed, Decimal::new(5, 0), now - Duration::days(3), now - Duration::days(1));
        assert_eq!(order.apply_coupon(coupon, now), Err(OrderError::Coupon(CouponError::Expired)));
        assert!(order.coupon().is_none());
    }

    #[test]
    fn test_complete_is_irreversible() {
        let (plain, _) = menu();
        let mut order = Order::create(Uuid::new_v4(), "usd");
        assert_eq!(order.complete(PaymentMethod::Cash, Utc::now()), Err(OrderError::NoItems));
        order.change_item(&plain, None, 1).unwrap();
        assert_eq!(order.complete(PaymentMethod::Cash, Utc::now()), Err(OrderError::MissingFulfilment));
        order.record_fulfilment(pickup()).unwrap();
        order.complete(PaymentMethod::Cash, Utc::now()).unwrap();
        assert!(order.is_complete());
        assert!(!order.is_checkout_eligible());
        assert_eq!(order.change_item(&plain, None, 1), Err(OrderError::AlreadyComplete));
        assert_eq!(order.record_fulfilment(pickup()), Err(OrderError::AlreadyComplete));
        assert_eq!(order.complete(PaymentMethod::Card, Utc::now()), Err(OrderError::AlreadyComplete));
        let events = order.take_events();
        assert!(matches!(events.first(), Some(OrderEvent::Created { .. })));
        assert!(matches!(events.last(), Some(OrderEvent::Completed { payment_method, .. }) if payment_method == "cash"));
    }
}
