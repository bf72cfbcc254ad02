//! Customer accounts and their addresses

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const CUSTOMER_ROLE: &str = "customer";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Emails are stored trimmed and lowercased so uniqueness is case-insensitive.
    pub fn create(name: impl Into<String>, email: &str) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: email.trim().to_lowercase(),
            role: CUSTOMER_ROLE.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        user_id: Uuid, line1: String, line2: Option<String>, city: String, postal_code: String, country: String, is_default: bool,
    ) -> Self {
        Self {
            id: Uuid::now_v7(), user_id, line1, line2, city, postal_code,
            country: country.trim().to_uppercase(), is_default, created_at: Utc::now(),
        }
    }
}
