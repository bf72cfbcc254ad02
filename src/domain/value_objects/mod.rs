//! Value Objects for the catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.chars().count() > 50 { return Err(SkuError::TooLong); }
        Ok(Self(value))
    }

    /// Random `SKU-########` code for products created without one.
    pub fn generate() -> Self { Self(format!("SKU-{:08}", rand::random::<u32>() % 100_000_000)) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = SkuError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkuError {
    #[error("SKU is required")]
    Empty,
    #[error("SKU must be at most 50 characters")]
    TooLong,
}

/// URL slug derived from a display name.
pub fn slugify(name: &str) -> String { name.trim().to_lowercase().replace(' ', "-") }

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_sku() { let sku = Sku::new(" prod-001 ").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }
    #[test]
    fn test_sku_limits() {
        assert_eq!(Sku::new("   "), Err(SkuError::Empty));
        assert_eq!(Sku::new("x".repeat(51)), Err(SkuError::TooLong));
        assert!(Sku::generate().as_str().starts_with("SKU-"));
    }
    #[test]
    fn test_slugify() { assert_eq!(slugify("Running Shoes"), "running-shoes"); }
}
