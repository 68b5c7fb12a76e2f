//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// A menu item. Pizzas sold in several sizes carry variants and usually no base price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub image_url: Option<String>,
    pub variants: Vec<ProductVariant>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant { pub id: Uuid, pub product_id: Uuid, pub title: String, pub size: Option<String>, pub price: Money }

impl Product {
    pub fn create(name: impl Into<String>, price: Option<Money>) -> Self {
        Self {
            id: Uuid::now_v7(), name: name.into(), description: None, price,
            image_url: None, variants: vec![], created_at: Utc::now(),
        }
    }

    pub fn with_variant(mut self, title: impl Into<String>, size: Option<&str>, price: Money) -> Self {
        let variant = ProductVariant { id: Uuid::now_v7(), product_id: self.id, title: title.into(), size: size.map(str::to_string), price };
        self.variants.push(variant);
        self
    }

    pub fn has_variants(&self) -> bool { !self.variants.is_empty() }
    pub fn variant(&self, id: Uuid) -> Option<&ProductVariant> { self.variants.iter().find(|v| v.id == id) }
}
