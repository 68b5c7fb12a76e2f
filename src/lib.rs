//! Pizza delivery storefront
//!
//! Online ordering for a single pizzeria.
//!
//! ## Features
//! - Menu with sized variants
//! - Guest and account carts
//! - Delivery or carry-out checkout
//! - Cash on delivery and hosted card payment
//! - Percent and fixed coupons
//! - Order history for registered customers

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod forms;
pub mod payments;
pub mod publisher;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Settings;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
