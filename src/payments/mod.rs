//! Hosted card checkout.
//!
//! The storefront never sees card data: it asks the gateway for a hosted
//! checkout session and later learns about the payment through a signed
//! webhook.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::TransactionId;

mod stripe_gateway;

pub use stripe_gateway::StripeGateway;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Card payments are not configured")]
    NotConfigured,
    #[error("Amount cannot be charged: {0}")]
    InvalidAmount(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("Webhook rejected: {0}")]
    InvalidWebhook(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutLine {
    pub name: String,
    /// Minor currency units (cents).
    pub unit_amount: i64,
    pub quantity: u64,
}

/// Everything the gateway needs to open a hosted checkout for one order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedCheckout {
    pub transaction_id: TransactionId,
    pub customer_email: Option<String>,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    /// Gateway-side coupon id.
    pub coupon: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

impl HostedCheckout {
    pub fn for_order(order: &Order, now: DateTime<Utc>, success_url: String, cancel_url: String) -> Result<Self, PaymentError> {
        let lines = order.items().iter().map(|item| {
            let unit = item.unit_price(order.currency());
            let unit_amount = unit.to_minor_units().filter(|a| *a >= 0)
                .ok_or_else(|| PaymentError::InvalidAmount(format!("{} for {}", unit, item.display_name())))?;
            Ok(CheckoutLine { name: item.display_name(), unit_amount, quantity: u64::from(item.quantity) })
        }).collect::<Result<Vec<_>, PaymentError>>()?;
        if lines.is_empty() {
            return Err(PaymentError::InvalidAmount("order has no items".to_string()));
        }
        Ok(Self {
            transaction_id: order.transaction_id(),
            customer_email: order.fulfilment().map(|f| f.email().to_string()),
            currency: order.currency().to_string(),
            lines,
            coupon: order.coupon().and_then(|c| c.gateway_coupon(now)).map(str::to_string),
            success_url,
            cancel_url,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostedSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentEvent {
    /// The customer finished the hosted checkout.
    CheckoutCompleted { transaction_id: TransactionId, paid: bool },
    Ignored(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, checkout: HostedCheckout) -> Result<HostedSession, PaymentError>;
    /// Verifies the signature and decodes the event.
    fn parse_webhook(&self, payload: &str, signature: &str) -> Result<PaymentEvent, PaymentError>;
}

pub type DynPaymentGateway = Arc<dyn PaymentGateway>;

/// Used when no gateway secret is configured: cash checkout keeps working.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_checkout_session(&self, _checkout: HostedCheckout) -> Result<HostedSession, PaymentError> {
        Err(PaymentError::NotConfigured)
    }

    fn parse_webhook(&self, _payload: &str, _signature: &str) -> Result<PaymentEvent, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Coupon, DiscountType, Product};
    use crate::domain::value_objects::Money;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order() -> Order {
        let plain = Product::create("Test Product", Some(Money::usd(Decimal::new(15, 0))));
        let sized = Product::create("Test Product with Variant", None)
            .with_variant("Test Variant 1", None, Money::usd(Decimal::new(1050, 2)));
        let mut order = Order::create(Uuid::new_v4(), "usd");
        order.change_item(&plain, None, 10).unwrap();
        order.change_item(&sized, Some(sized.variants[0].id), 2).unwrap();
        order
    }

    #[test]
    fn test_lines_in_minor_units() {
        let checkout = HostedCheckout::for_order(&order(), Utc::now(), "s".into(), "c".into()).unwrap();
        assert_eq!(checkout.lines, vec![
            CheckoutLine { name: "Test Product".into(), unit_amount: 1500, quantity: 10 },
            CheckoutLine { name: "Test Product with Variant (Test Variant 1)".into(), unit_amount: 1050, quantity: 2 },
        ]);
        assert_eq!(checkout.coupon, None);
    }

    #[test]
    fn test_coupon_forwarded_only_while_valid() {
        let mut order = order();
        let now = Utc::now();
        let mut coupon = Coupon::new("winter", DiscountType::Percent, Decimal::new(50, 0), now - Duration::hours(1), now + Duration::days(1));
        coupon.stripe_coupon_id = Some("co_winter".into());
        order.apply_coupon(coupon, now).unwrap();
        let checkout = HostedCheckout::for_order(&order, now, "s".into(), "c".into()).unwrap();
        assert_eq!(checkout.coupon.as_deref(), Some("co_winter"));
        let later = HostedCheckout::for_order(&order, now + Duration::days(2), "s".into(), "c".into()).unwrap();
        assert_eq!(later.coupon, None);
    }

    #[test]
    fn test_empty_order_rejected() {
        let empty = Order::create(Uuid::new_v4(), "usd");
        assert!(matches!(HostedCheckout::for_order(&empty, Utc::now(), "s".into(), "c".into()), Err(PaymentError::InvalidAmount(_))));
    }
}
