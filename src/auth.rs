use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the authentication cookie
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub exp: i64, // Expiration time as Unix timestamp
    pub iat: i64, // Issued at time as Unix timestamp
}

/// Authenticated caller, inserted into request extensions by the
/// authentication stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsPrincipal {
    pub user_id: Uuid,
    pub email: String,
}

impl TryFrom<Claims> for ClaimsPrincipal {
    type Error = AppError;

    fn try_from(claims: Claims) -> AppResult<Self> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Malformed subject claim".to_string()))?;
        Ok(Self {
            user_id,
            email: claims.email,
        })
    }
}

/// Cookie authentication service: issues and validates the signed token
/// stored in the authentication cookie
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    expiration_hours: i64,
    cookie_name: String,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.signing_key.clone(),
            expiration_hours: config.expiration_hours,
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Generate a signed token for a user
    pub fn generate_token(&self, user_id: Uuid, email: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = Duration::try_hours(self.expiration_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Cookie lifetime of {} hours is out of range",
                    self.expiration_hours
                ))
            })?;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )?)
    }

    /// Validate a token and return claims
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Token validation failed: {}", e)))
    }

    /// `Set-Cookie` value signing the user in
    pub fn sign_in_cookie(&self, token: &str, secure: bool) -> String {
        let max_age = self.expiration_hours.saturating_mul(3600);
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name, token, max_age
        );
        if secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value removing the authentication cookie
    pub fn sign_out_cookie(&self) -> String {
        format!(
            "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax",
            self.cookie_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_service(hours: i64) -> AuthService {
        AuthService::new(&AuthConfig {
            cookie_name: ".Test.Identity".to_string(),
            signing_key: "test_secret_key_that_is_long_enough_123".to_string(),
            expiration_hours: hours,
            require_confirmed_account: true,
            password_hash_cost: 4,
        })
    }

    #[test]
    fn test_token_generation_and_validation() {
        let auth_service = auth_service(24);
        let user_id = Uuid::new_v4();

        let token = auth_service
            .generate_token(user_id, "ada@example.com")
            .expect("Failed to generate token");

        let claims = auth_service
            .validate_token(&token)
            .expect("Failed to validate token");

        let principal = ClaimsPrincipal::try_from(claims).unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.email, "ada@example.com");
    }

    #[test]
    fn test_invalid_token_validation() {
        let result = auth_service(24).validate_token("invalid_token");
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_sign_in_cookie_attributes() {
        let cookie = auth_service(1).sign_in_cookie("abc", true);
        assert!(cookie.starts_with(".Test.Identity=abc;"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let auth_service = auth_service(i64::MAX);

        let result = auth_service.generate_token(Uuid::new_v4(), "ada@example.com");
        assert!(matches!(result, Err(AppError::Internal(_))));

        let cookie = auth_service.sign_in_cookie("abc", false);
        assert!(cookie.contains(&format!("Max-Age={}", i64::MAX)));
    }
}
