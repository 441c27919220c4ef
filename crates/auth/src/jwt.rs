//! Signed access-credential encoding/decoding (HS256).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::claims::{validate_claims, AccessClaims, TokenValidationError};

/// Validates a bearer credential and yields its claims.
///
/// Implemented by signature schemes; the guard and middleware only see this
/// trait so the scheme can change without touching callers.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenValidationError>;
}

/// HMAC-SHA256 signer/validator over a shared secret.
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign claims into a compact JWT.
    pub fn sign(&self, claims: &AccessClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenValidationError::Signing(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<AccessClaims, TokenValidationError> {
        // Time-window validation is done explicitly in `validate` against the
        // caller's clock; jsonwebtoken only checks the signature here.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<AccessClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenValidationError> {
        let claims = self.decode(token)?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{RoleSlug, UserId};
    use chrono::Duration;

    fn sample_claims(now: DateTime<Utc>, ttl: Duration) -> AccessClaims {
        AccessClaims {
            sub: UserId::new(),
            organization_id: None,
            organization_slug: None,
            is_owner: false,
            subscription_status: None,
            max_users: None,
            roles: vec![RoleSlug::new("member")],
            permissions: vec![],
            modules: None,
            teams: vec![],
            user_modules: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    #[test]
    fn sign_then_validate_round_trips() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let now = Utc::now();
        let claims = sample_claims(now, Duration::minutes(10));

        let token = jwt.sign(&claims).unwrap();
        let decoded = jwt.validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_is_malformed_not_expired() {
        let signer = Hs256Jwt::new(b"secret-a");
        let verifier = Hs256Jwt::new(b"secret-b");
        let now = Utc::now();

        let token = signer.sign(&sample_claims(now, Duration::minutes(10))).unwrap();
        let err = verifier.validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn expired_token_fails_validation() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let now = Utc::now();

        let token = jwt.sign(&sample_claims(now - Duration::hours(3), Duration::hours(1))).unwrap();
        let err = jwt.validate(&token, now).unwrap_err();
        assert_eq!(err, TokenValidationError::Expired);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let jwt = Hs256Jwt::new(b"test-secret");
        let now = Utc::now();

        let mut token = jwt.sign(&sample_claims(now, Duration::minutes(10))).unwrap();
        token.push('x');
        assert!(matches!(
            jwt.validate(&token, now).unwrap_err(),
            TokenValidationError::Malformed(_)
        ));
    }
}
