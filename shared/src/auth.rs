use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::http::{header::AUTHORIZATION, HeaderMap};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::error::ApiError;
use crate::types::Role;

type HmacSha256 = Hmac<Sha256>;

/// Identity carried by a bearer token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Expiry, unix seconds
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.sub, role = %self.role, required = %role, "Role check failed");
            Err(ApiError::Forbidden(format!(
                "User role {} is not authorized to access this route",
                self.role
            )))
        }
    }

    /// Owners may touch their own records, admins may touch anyone's
    pub fn ensure_owner_or_admin(&self, owner_id: &str, message: &str) -> Result<(), ApiError> {
        if self.sub == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(message.to_string()))
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

fn mac(secret: &str) -> Result<HmacSha256, ApiError> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid token secret: {}", e)))
}

/// Token format: `base64url(claims json) "." base64url(hmac-sha256)`
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    let payload = serde_json::to_vec(claims)
        .map_err(|e| ApiError::Internal(format!("Failed to encode claims: {}", e)))?;
    let payload = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = mac(secret)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload, signature))
}

pub fn verify_token(token: &str, secret: &str, now: i64) -> Result<Claims, ApiError> {
    let invalid = || ApiError::Unauthorized("Not authorized, token failed".to_string());

    let (payload, signature) = token.split_once('.').ok_or_else(invalid)?;
    let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;

    let mut mac = mac(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).map_err(|_| invalid())?;

    let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;

    if claims.exp <= now {
        return Err(ApiError::Unauthorized("Not authorized, token expired".to_string()));
    }
    Ok(claims)
}

pub fn claims_for(user_id: &str, role: Role, config: &Config, now: i64) -> Result<Claims, ApiError> {
    let exp = config
        .token_ttl_hours
        .checked_mul(3600)
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or_else(|| ApiError::Internal("Token expiry overflows".into()))?;
    Ok(Claims {
        sub: user_id.to_string(),
        role,
        exp,
    })
}

/// Resolve the caller from the `Authorization: Bearer <token>` header
pub fn authenticate(headers: &HeaderMap, config: &Config) -> Result<Claims, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".to_string()))?;

    verify_token(token, &config.token_secret, chrono::Utc::now().timestamp())
}

pub fn authorize(headers: &HeaderMap, config: &Config, role: Role) -> Result<Claims, ApiError> {
    let claims = authenticate(headers, config)?;
    claims.require_role(role)?;
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http::HeaderValue;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config() -> Config {
        Config::from_lookup(|key| (key == "TOKEN_SECRET").then(|| SECRET.to_string())).unwrap()
    }

    fn claims(role: Role, exp: i64) -> Claims {
        Claims {
            sub: "user-1".into(),
            role,
            exp,
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash));
        assert!(!verify_password("password124", &hash));
        assert!(!verify_password("password123", "not-a-hash"));
    }

    #[test]
    fn test_token_round_trip() {
        let c = claims(Role::Admin, 2_000);
        let token = issue_token(&c, SECRET).unwrap();
        assert_eq!(verify_token(&token, SECRET, 1_000).unwrap(), c);
    }

    #[test]
    fn test_token_rejects_wrong_secret_and_tampering() {
        let token = issue_token(&claims(Role::Customer, 2_000), SECRET).unwrap();
        assert!(verify_token(&token, "another-secret-another-secret-xx", 1_000).is_err());

        // Swap in a payload claiming admin but keep the old signature
        let forged = issue_token(&claims(Role::Admin, 2_000), SECRET).unwrap();
        let (forged_payload, _) = forged.split_once('.').unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let tampered = format!("{}.{}", forged_payload, signature);
        assert!(matches!(
            verify_token(&tampered, SECRET, 1_000),
            Err(ApiError::Unauthorized(_))
        ));

        assert!(verify_token("garbage", SECRET, 1_000).is_err());
    }

    #[test]
    fn test_token_expiry() {
        let token = issue_token(&claims(Role::Customer, 1_000), SECRET).unwrap();
        assert_eq!(
            verify_token(&token, SECRET, 1_000),
            Err(ApiError::Unauthorized("Not authorized, token expired".into()))
        );
    }

    #[test]
    fn test_claims_expiry_is_checked() {
        let mut config = config();
        let claims = claims_for("user-1", Role::Admin, &config, 1_000).unwrap();
        assert_eq!(claims.exp, 1_000 + 168 * 3600);

        config.token_ttl_hours = i64::MAX;
        assert!(matches!(
            claims_for("user-1", Role::Admin, &config, 1_000),
            Err(ApiError::Internal(_))
        ));
        config.token_ttl_hours = 1;
        assert!(claims_for("user-1", Role::Admin, &config, i64::MAX).is_err());
    }

    #[test]
    fn test_authenticate_header_forms() {
        let config = config();
        let now = chrono::Utc::now().timestamp();
        let token = issue_token(&claims_for("user-9", Role::Customer, &config, now).unwrap(), SECRET).unwrap();

        let mut headers = HeaderMap::new();
        assert!(matches!(authenticate(&headers, &config), Err(ApiError::Unauthorized(_))));

        headers.insert(AUTHORIZATION, HeaderValue::from_str(&token).unwrap());
        assert!(authenticate(&headers, &config).is_err(), "scheme is required");

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        assert_eq!(authenticate(&headers, &config).unwrap().sub, "user-9");

        assert!(matches!(
            authorize(&headers, &config, Role::Admin),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_owner_or_admin() {
        let customer = claims(Role::Customer, 0);
        assert!(customer.ensure_owner_or_admin("user-1", "denied").is_ok());
        assert_eq!(
            customer.ensure_owner_or_admin("user-2", "denied"),
            Err(ApiError::Forbidden("denied".into()))
        );

        let admin = claims(Role::Admin, 0);
        assert!(admin.ensure_owner_or_admin("user-2", "denied").is_ok());
    }
}
