//! Identity token codec (HS256 JWT).
//!
//! Tokens are compact JWTs signed with HMAC-SHA256 over a fixed claim payload
//! `{user_id, name, role, iat, exp}`. Expiry is checked here against an
//! explicit `now` rather than the system clock, so the validity window can be
//! exercised at its boundaries.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::claims::validate_window;
use crate::{ClaimSet, Role, SigningSecret, TokenError};

/// Default validity window: 24 hours from issuance.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Signed identity token as handed to clients.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("IdentityToken(..)")
    }
}

/// On-the-wire claim payload.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    user_id: String,
    name: String,
    role: String,
    iat: i64,
    exp: i64,
}

impl WireClaims {
    fn into_claim_set(self) -> Result<ClaimSet, TokenError> {
        let issued_at = DateTime::<Utc>::from_timestamp(self.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::<Utc>::from_timestamp(self.exp, 0).ok_or(TokenError::Malformed)?;
        Ok(ClaimSet::new(
            self.user_id,
            self.name,
            Role::new(self.role),
            issued_at,
            expires_at,
        ))
    }
}

/// Issues and verifies identity tokens with a single signing secret.
///
/// Cheap to share behind an `Arc`; holds no mutable state.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &SigningSecret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced by `validate_window` against the caller's clock.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            encoding: EncodingKey::from_secret(secret.expose()),
            decoding: DecodingKey::from_secret(secret.expose()),
            validation,
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// Override the validity window. Non-positive windows are rejected.
    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self, TokenError> {
        if ttl <= Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }
        self.ttl = ttl;
        Ok(self)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a new token for the given principal, valid from `now` for `ttl`.
    pub fn issue(
        &self,
        subject: &str,
        display_name: &str,
        role: &Role,
        now: DateTime<Utc>,
    ) -> Result<IdentityToken, TokenError> {
        let iat = now.timestamp();
        let exp = iat
            .checked_add(self.ttl.num_seconds())
            .filter(|exp| DateTime::<Utc>::from_timestamp(*exp, 0).is_some())
            .ok_or_else(|| TokenError::Encoding("token expiry is out of range".to_string()))?;

        let claims = WireClaims {
            user_id: subject.to_string(),
            name: display_name.to_string(),
            role: role.as_str().to_string(),
            iat,
            exp,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(IdentityToken)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature and expiry, returning the claim set on success.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError> {
        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims.into_claim_set()?;
        validate_window(&claims, now)?;
        Ok(claims)
    }
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl_secs", &self.ttl.num_seconds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const BASE64URL: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&SigningSecret::new(secret).unwrap())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let codec = codec("test-secret");
        let token = codec.issue("u1", "Alice", &Role::ADMIN, t0()).unwrap();

        let claims = codec.verify(token.as_str(), t0()).unwrap();
        assert_eq!(claims.subject(), "u1");
        assert_eq!(claims.display_name(), "Alice");
        assert_eq!(claims.role(), &Role::ADMIN);
        assert_eq!(claims.issued_at(), t0());
        assert_eq!(claims.expires_at(), t0() + Duration::hours(24));
    }

    #[test]
    fn expiry_boundary_is_24_hours() {
        let codec = codec("test-secret");
        let token = codec.issue("u1", "Alice", &Role::new("sales"), t0()).unwrap();
        let expiry = t0() + Duration::hours(24);

        assert!(codec.verify(token.as_str(), expiry - Duration::seconds(1)).is_ok());
        assert_eq!(
            codec.verify(token.as_str(), expiry).unwrap_err(),
            TokenError::Expired
        );
        assert_eq!(
            codec.verify(token.as_str(), expiry + Duration::seconds(1)).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn custom_ttl_is_honoured() {
        let codec = codec("test-secret").with_ttl(Duration::minutes(5)).unwrap();
        let token = codec.issue("u1", "Alice", &Role::new("sales"), t0()).unwrap();

        assert!(codec.verify(token.as_str(), t0() + Duration::minutes(4)).is_ok());
        assert_eq!(
            codec.verify(token.as_str(), t0() + Duration::minutes(5)).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        assert_eq!(
            codec("test-secret").with_ttl(Duration::zero()).unwrap_err(),
            TokenError::InvalidTtl
        );
        assert_eq!(
            codec("test-secret").with_ttl(Duration::seconds(-5)).unwrap_err(),
            TokenError::InvalidTtl
        );
    }

    #[test]
    fn expiry_beyond_representable_time_fails_to_issue() {
        let codec = codec("test-secret").with_ttl(Duration::days(365)).unwrap();
        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);

        assert!(matches!(
            codec.issue("u1", "Alice", &Role::ADMIN, late),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn any_altered_signature_character_is_rejected() {
        let codec = codec("test-secret");
        let token = codec.issue("u1", "Alice", &Role::ADMIN, t0()).unwrap().into_string();
        let sig_start = token.rfind('.').unwrap() + 1;

        for pos in sig_start..token.len() {
            let original = token.as_bytes()[pos] as char;
            let replacement = BASE64URL.chars().find(|c| *c != original).unwrap();

            let mut tampered = token.clone();
            tampered.replace_range(pos..pos + 1, &replacement.to_string());

            assert_eq!(
                codec.verify(&tampered, t0()).unwrap_err(),
                TokenError::InvalidSignature,
                "tampered signature accepted at byte {pos}"
            );
        }
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let codec = codec("test-secret");
        let token = codec.issue("u1", "Alice", &Role::new("sales"), t0()).unwrap().into_string();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();

        // Re-sign a different payload under another key, then splice it in.
        let forged = self::codec("attacker-secret")
            .issue("u1", "Alice", &Role::ADMIN, t0())
            .unwrap()
            .into_string();
        parts[1] = forged.split('.').nth(1).unwrap().to_string();

        assert_eq!(
            codec.verify(&parts.join("."), t0()).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = codec("secret-a").issue("u1", "Alice", &Role::ADMIN, t0()).unwrap();
        assert_eq!(
            codec("secret-b").verify(token.as_str(), t0()).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec("test-secret");
        for token in ["", "abc", "a.b", "a.b.c", "....", "Bearer xyz"] {
            assert_eq!(
                codec.verify(token, t0()).unwrap_err(),
                TokenError::Malformed,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn other_algorithms_are_malformed() {
        let secret = "test-secret";
        let claims = WireClaims {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            role: "admin".to_string(),
            iat: t0().timestamp(),
            exp: t0().timestamp() + 60,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            codec(secret).verify(&token, t0()).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn missing_claims_are_malformed() {
        let secret = "test-secret";
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "user_id": "u1", "exp": t0().timestamp() + 60 }),
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            codec(secret).verify(&token, t0()).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = codec("test-secret").issue("u1", "Alice", &Role::ADMIN, t0()).unwrap();
        assert_eq!(format!("{token:?}"), "IdentityToken(..)");
    }

    proptest! {
        #[test]
        fn round_trip_preserves_identity(
            subject in "[a-zA-Z0-9-]{1,40}",
            name in "\\PC{0,40}",
            role in "[a-z_]{1,16}",
            offset in 0i64..DEFAULT_TOKEN_TTL_SECS,
        ) {
            let codec = codec("prop-secret");
            let token = codec.issue(&subject, &name, &Role::new(role.clone()), t0()).unwrap();
            let claims = codec.verify(token.as_str(), t0() + Duration::seconds(offset)).unwrap();

            prop_assert_eq!(claims.subject(), subject.as_str());
            prop_assert_eq!(claims.display_name(), name.as_str());
            prop_assert_eq!(claims.role().as_str(), role.as_str());
        }
    }
}
