//! Signed bearer tokens.
//!
//! Tokens are HS256 JWTs binding the authenticated username under a
//! server-wide secret. There is no server-side session table; possession of
//! a validly signed token is the whole credential. The token format carries
//! no expiry claim.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AuthError, Result};

const ISSUER: &str = "muster";

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated username.
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: u64,
    /// Issuer.
    pub iss: String,
}

/// Sign a token binding `username` under the server-wide secret.
pub fn issue_token(username: &str, secret: &str) -> Result<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        iss: ISSUER.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

/// Verify a token's signature and decode its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    // Tokens carry no exp claim; signature and issuer are still enforced.
    validation.required_spec_claims.clear();
    validation.validate_exp = false;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-token-tests";

    #[test]
    fn test_issue_and_verify_token() {
        let token = issue_token("admin", TEST_SECRET).unwrap();
        let claims = verify_token(&token, TEST_SECRET).unwrap();

        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = issue_token("admin", TEST_SECRET).unwrap();

        let result = verify_token(&token, "some-other-secret");
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_tampered_token_fails() {
        let token = issue_token("admin", TEST_SECRET).unwrap();

        // Flip a character in the payload segment.
        let mut tampered = token.into_bytes();
        let mid = tampered.len() / 2;
        tampered[mid] = if tampered[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(verify_token(&tampered, TEST_SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_fails() {
        assert!(verify_token("not.a.token", TEST_SECRET).is_err());
        assert!(verify_token("", TEST_SECRET).is_err());
    }
}
