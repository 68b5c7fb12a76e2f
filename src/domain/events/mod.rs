//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::TransactionId;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Created { order_id: Uuid, customer_id: Uuid },
    ItemChanged { order_id: Uuid, product_id: Uuid, variant_id: Option<Uuid>, quantity: u32 },
    CouponApplied { order_id: Uuid, code: String },
    Completed { order_id: Uuid, transaction_id: TransactionId, payment_method: String, fulfilment: String, total: Decimal },
}

impl OrderEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Created { .. } => "orders.created",
            Self::ItemChanged { .. } => "orders.item_changed",
            Self::CouponApplied { .. } => "orders.coupon_applied",
            Self::Completed { .. } => "orders.completed",
        }
    }
}
