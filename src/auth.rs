//! Admin authentication for the analytics routes.
//!
//! Only verification lives here; tokens are issued elsewhere.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self { Self { key: DecodingKey::from_secret(secret.as_bytes()) } }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

/// Extracts verified claims of an admin caller.
#[derive(Debug, Clone)]
pub struct Admin(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for Admin
where
    TokenVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Not authorized, no token"))?;
        let claims = TokenVerifier::from_ref(state).verify(token)?;
        if claims.role != ADMIN_ROLE {
            return Err(AppError::forbidden("You do not have permission to perform this action"));
        }
        Ok(Admin(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, role: &str, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims { sub: "u1".into(), role: role.into(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_roundtrip() {
        let v = TokenVerifier::new("s");
        assert_eq!(v.verify(&token("s", "admin", 600)).unwrap().role, "admin");
    }

    #[test]
    fn test_expired_and_forged_tokens() {
        let v = TokenVerifier::new("s");
        assert!(matches!(v.verify(&token("s", "admin", -3600)), Err(AppError::TokenExpired)));
        assert!(matches!(v.verify(&token("other", "admin", 600)), Err(AppError::InvalidToken(_))));
        assert!(matches!(v.verify("not-a-jwt"), Err(AppError::InvalidToken(_))));
    }
}
