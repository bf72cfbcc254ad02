//! Coupon Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Percentage discount redeemable until `expires_at`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: u8,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// `discount_percent` is clamped to `1..=100`; codes are stored uppercased.
    pub fn create(code: &str, discount_percent: u8, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::now_v7(),
            code: normalize_code(code),
            discount_percent: discount_percent.clamp(1, 100),
            expires_at,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |at| now < at)
    }

    /// Discount in minor units, rounded down. Never exceeds `subtotal`.
    pub fn discount_for(&self, subtotal: i64) -> i64 {
        let discount = i128::from(subtotal.max(0)) * i128::from(self.discount_percent) / 100;
        i64::try_from(discount).unwrap_or(subtotal)
    }
}

pub fn normalize_code(code: &str) -> String { code.trim().to_uppercase() }

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_coupon_discount() {
        let c = Coupon::create(" save10 ", 10, None);
        assert_eq!(c.code, "SAVE10");
        assert_eq!(c.discount_for(1999), 199);
        assert_eq!(c.discount_for(i64::MAX), i64::MAX / 10);
        assert_eq!(Coupon::create("ALL", 250, None).discount_for(500), 500);
    }

    #[test]
    fn test_coupon_expiry() {
        let now = Utc::now();
        let mut c = Coupon::create("X", 5, Some(now + Duration::days(1)));
        assert!(c.is_redeemable(now));
        assert!(!c.is_redeemable(now + Duration::days(2)));
        c.active = false;
        assert!(!c.is_redeemable(now));
    }
}
