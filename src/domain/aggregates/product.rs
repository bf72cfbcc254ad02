//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{slugify, Sku};

#[derive(Clone, Debug, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: Sku,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub category_id: Option<Uuid>,
    pub inventory_quantity: i32,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus { #[default] Active, Deleted }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Active => "active", Self::Deleted => "deleted" }
    }

    pub fn parse(s: &str) -> Self { if s == "deleted" { Self::Deleted } else { Self::Active } }
}

impl Product {
    pub fn create(sku: Sku, name: impl Into<String>, price: i64) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(), sku, name: name.into(), description: None, price,
            category_id: None, inventory_quantity: 0, status: ProductStatus::Active,
            created_at: now, updated_at: now, events: vec![],
        };
        product.raise_event(DomainEvent::Product(ProductEvent::Created { product_id: product.id, sku: product.sku.clone() }));
        product
    }

    /// Rebuilds a product loaded from storage; no events are raised.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, sku: Sku, name: String, description: Option<String>, price: i64, category_id: Option<Uuid>,
        inventory_quantity: i32, status: ProductStatus, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, sku, name, description, price, category_id, inventory_quantity, status, created_at, updated_at, events: vec![] }
    }

    pub fn is_active(&self) -> bool { self.status == ProductStatus::Active }

    pub fn delete(&mut self) {
        self.status = ProductStatus::Deleted;
        self.updated_at = Utc::now();
        self.raise_event(DomainEvent::Product(ProductEvent::Deleted { product_id: self.id }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn create(name: impl Into<String>, description: Option<String>, parent_id: Option<Uuid>) -> Self {
        let name = name.into();
        Self { id: Uuid::now_v7(), slug: slugify(&name), name, description, parent_id, created_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_product_create() {
        let mut p = Product::create(Sku::new("TEST-001").unwrap(), "Test Product", 1999);
        assert_eq!(p.name, "Test Product");
        assert!(p.is_active());
        assert_eq!(p.take_events().len(), 1);
    }
    #[test]
    fn test_soft_delete() {
        let mut p = Product::create(Sku::new("TEST").unwrap(), "P", 10);
        p.delete();
        assert_eq!(p.status, ProductStatus::Deleted);
        assert_eq!(ProductStatus::parse(p.status.as_str()), ProductStatus::Deleted);
    }
    #[test]
    fn test_category_slug() {
        let c = Category::create("Home Garden", None, None);
        assert_eq!(c.slug, "home-garden");
    }
}
