//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.to_lowercase() } }
    pub fn usd(amount: Decimal) -> Self { Self::new(amount, "usd") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Money { Money::new(self.amount * Decimal::from(qty), &self.currency) }

    /// `percent` of this amount, rounded to cents. Percentages above 100 are capped.
    pub fn percent(&self, percent: Decimal) -> Money {
        let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        Money::new((self.amount * percent / Decimal::ONE_HUNDRED).round_dp(2), &self.currency)
    }

    /// Subtracts `other`, flooring at zero.
    pub fn saturating_sub(&self, other: &Money) -> Money {
        Money::new((self.amount - other.amount).max(Decimal::ZERO), &self.currency)
    }

    /// Amount in the currency's minor unit (cents), as payment gateways expect it.
    pub fn to_minor_units(&self) -> Option<i64> {
        (self.amount * Decimal::ONE_HUNDRED).round().to_i64()
    }
}

impl Default for Money { fn default() -> Self { Self::zero("usd") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.round_dp(2), self.currency.to_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Currency mismatch")]
    CurrencyMismatch,
}

/// Public identifier of an order, shared with the payment gateway as client reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn generate() -> Self { Self(Uuid::new_v4()) }
    pub fn from_uuid(id: Uuid) -> Self { Self(id) }
    pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for TransactionId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Uuid::parse_str(s.trim()).map(Self) }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_money_add() {
        let a = Money::usd(Decimal::new(100, 0));
        let b = Money::usd(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert!(a.add(&Money::zero("eur")).is_err());
    }
    #[test]
    fn test_money_percent_and_floor() {
        let total = Money::usd(Decimal::new(450, 0));
        assert_eq!(total.percent(Decimal::new(50, 0)).amount(), Decimal::new(225, 0));
        assert_eq!(total.percent(Decimal::new(150, 0)).amount(), Decimal::new(450, 0));
        let small = Money::usd(Decimal::new(5, 0));
        assert!(small.saturating_sub(&Money::usd(Decimal::new(10, 0))).is_zero());
    }
    #[test]
    fn test_minor_units() {
        assert_eq!(Money::usd(Decimal::new(1999, 2)).to_minor_units(), Some(1999));
        assert_eq!(Money::usd(Decimal::new(15, 0)).to_minor_units(), Some(1500));
    }
    #[test]
    fn test_transaction_id_parse() {
        let id = TransactionId::generate();
        assert_eq!(id.to_string().parse::<TransactionId>().unwrap(), id);
        assert!("not-a-uuid".parse::<TransactionId>().is_err());
    }
}
