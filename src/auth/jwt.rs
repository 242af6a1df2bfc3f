//! JWT Token Handler
//! Mission: Issue and verify signed, time-bound session tokens

use crate::auth::models::Claims;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;

/// Session lifetime shared by the token and its cookie
pub const TOKEN_TTL_DAYS: i64 = 7;

/// Placeholder secret shipped in public examples; never acceptable
pub const PLACEHOLDER_SECRET: &str = "your-secret-key-change-in-production";

/// Shortest secret accepted at startup (bytes)
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or has an invalid signature")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Reject secrets that are missing, well-known or too short
pub fn validate_secret(secret: &str) -> Result<()> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        bail!("JWT_SECRET is empty");
    }
    if trimmed == PLACEHOLDER_SECRET {
        bail!("JWT_SECRET is the public placeholder value");
    }
    if trimmed.len() < MIN_SECRET_LEN {
        bail!(
            "JWT_SECRET must be at least {} bytes (got {})",
            MIN_SECRET_LEN,
            trimmed.len()
        );
    }
    Ok(())
}

/// JWT handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        // Expiry is checked by hand against an explicit clock, without leeway.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::days(TOKEN_TTL_DAYS),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for a user, valid for seven days from now
    pub fn issue(&self, user_id: i64, username: &str) -> Result<IssuedToken> {
        self.issue_at(user_id, username, Utc::now())
    }

    pub fn issue_at(&self, user_id: i64, username: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
        // Claims hold whole seconds; `expires_at` must match `exp` exactly.
        let now = now.trunc_subsecs(0);
        let expires_at = now
            .checked_add_signed(self.ttl)
            .context("Invalid timestamp")?;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        debug!(
            "Issuing session token for user {} ({}), expires {}",
            username, user_id, expires_at
        );

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to sign session token")?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token's signature, structure and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Session token rejected: {}", e);
            TokenError::Invalid
        })?;

        if now.timestamp() >= decoded.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "test-secret-key-0123456789-abcdefghij";

    fn handler() -> JwtHandler {
        JwtHandler::new(SECRET)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let handler = handler();
        let issued = handler.issue(42, "alice").unwrap();
        assert!(!issued.token.is_empty());

        let claims = handler.verify(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_expiry_is_seven_days() {
        let now = fixed_now();
        let issued = handler().issue_at(1, "alice", now).unwrap();
        assert_eq!(issued.expires_at - now, Duration::days(7));

        let claims = handler().verify_at(&issued.token, now).unwrap();
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn test_valid_strictly_before_expiry() {
        let handler = handler();
        let now = fixed_now();
        let issued = handler.issue_at(1, "alice", now).unwrap();
        let expiry = issued.expires_at;

        assert!(handler.verify_at(&issued.token, expiry - Duration::seconds(1)).is_ok());
        assert_eq!(
            handler.verify_at(&issued.token, expiry),
            Err(TokenError::Expired)
        );
        assert_eq!(
            handler.verify_at(&issued.token, expiry + Duration::days(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_fractional_issue_time_reports_exact_expiry() {
        let handler = handler();
        let now = fixed_now() + Duration::milliseconds(700);
        let issued = handler.issue_at(1, "alice", now).unwrap();

        assert_eq!(issued.expires_at.timestamp_subsec_nanos(), 0);
        let claims = handler.verify_at(&issued.token, now).unwrap();
        assert_eq!(claims.exp, issued.expires_at.timestamp());

        let just_before = issued.expires_at - Duration::milliseconds(300);
        assert!(handler.verify_at(&issued.token, just_before).is_ok());
        assert_eq!(
            handler.verify_at(&issued.token, issued.expires_at),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_malformed_token_rejected() {
        let handler = handler();
        assert_eq!(handler.verify("invalid.token.here"), Err(TokenError::Invalid));
        assert_eq!(handler.verify(""), Err(TokenError::Invalid));
    }

    #[test]
    fn test_different_secrets_reject() {
        let other = JwtHandler::new("another-secret-key-0123456789-abcdef");
        let issued = handler().issue(1, "alice").unwrap();
        assert_eq!(other.verify(&issued.token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let handler = handler();
        let issued = handler.issue(1, "alice").unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged = handler.issue(2, "mallory").unwrap();
        let forged_payload = forged.token.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;

        assert_eq!(handler.verify(&parts.join(".")), Err(TokenError::Invalid));
    }

    #[test]
    fn test_secret_validation() {
        assert!(validate_secret(SECRET).is_ok());
        assert!(validate_secret("").is_err());
        assert!(validate_secret("   ").is_err());
        assert!(validate_secret(PLACEHOLDER_SECRET).is_err());
        assert!(validate_secret("short-secret").is_err());
    }
}
