//! Aggregates module
pub mod product;
pub mod order;
pub mod coupon;
pub mod customer;

pub use product::{Product, ProductVariant};
pub use order::{Order, OrderError, OrderItem, OrderSummary, OrderItemSummary, Fulfilment, ShippingAddress, PickUpDetail, Urgency, PaymentMethod};
pub use coupon::{Coupon, CouponError, DiscountType};
pub use customer::{Customer, User};
