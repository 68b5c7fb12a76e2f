//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountType { Percent, Fixed }

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percent => "Percent", Self::Fixed => "Fixed" }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value { "Percent" => Some(Self::Percent), "Fixed" => Some(Self::Fixed), _ => None }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub active: bool,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// Matching coupon configured on the payment gateway, used for card checkout.
    pub stripe_coupon_id: Option<String>,
}

impl Coupon {
    pub fn new(code: impl Into<String>, discount_type: DiscountType, discount_amount: Decimal, valid_from: DateTime<Utc>, valid_to: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(), code: code.into(), active: true, discount_type, discount_amount,
            valid_from, valid_to, stripe_coupon_id: None,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.valid_from <= now && now <= self.valid_to
    }

    pub fn check(&self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.active { return Err(CouponError::Inactive); }
        if now < self.valid_from { return Err(CouponError::NotYetValid); }
        if now > self.valid_to { return Err(CouponError::Expired); }
        Ok(())
    }

    /// Discount this coupon grants on `subtotal`; never more than the subtotal itself.
    pub fn discount_on(&self, subtotal: &Money, now: DateTime<Utc>) -> Money {
        if !self.is_valid_at(now) { return Money::zero(subtotal.currency()); }
        match self.discount_type {
            DiscountType::Percent => subtotal.percent(self.discount_amount),
            DiscountType::Fixed => {
                let amount = self.discount_amount.max(Decimal::ZERO).min(subtotal.amount());
                Money::new(amount, subtotal.currency())
            }
        }
    }

    /// Gateway coupon to apply to a hosted checkout, only while the coupon is usable.
    pub fn gateway_coupon(&self, now: DateTime<Utc>) -> Option<&str> {
        if !self.is_valid_at(now) { return None; }
        self.stripe_coupon_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon is not valid yet")]
    NotYetValid,
    #[error("This coupon has expired")]
    Expired,
}
