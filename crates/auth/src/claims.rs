use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::Role;

/// Verified identity carried by a token.
///
/// There is no public constructor and no `Deserialize` impl: a `ClaimSet`
/// only comes out of [`crate::TokenCodec::verify`] (or `issue`), so holding
/// one means the signature and expiry were checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimSet {
    subject: String,
    display_name: String,
    role: Role,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ClaimSet {
    pub(crate) fn new(
        subject: String,
        display_name: String,
        role: Role,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject,
            display_name,
            role,
            issued_at,
            expires_at,
        }
    }

    /// Subject / user identifier.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token structure, header, encoding or claim payload is unusable.
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(String),

    #[error("token ttl must be positive")]
    InvalidTtl,
}

/// Check the validity window of a decoded claim set.
///
/// `expires_at` is exclusive: a token is expired at exactly its expiry instant.
pub(crate) fn validate_window(claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed);
    }
    if now >= claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn claims(issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> ClaimSet {
        ClaimSet::new(
            "u1".to_string(),
            "Alice".to_string(),
            Role::new("sales"),
            issued_at,
            expires_at,
        )
    }

    #[test]
    fn expiry_is_exclusive() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let c = claims(t0, t0 + Duration::hours(1));

        assert_eq!(validate_window(&c, t0), Ok(()));
        assert_eq!(
            validate_window(&c, t0 + Duration::hours(1) - Duration::seconds(1)),
            Ok(())
        );
        assert_eq!(
            validate_window(&c, t0 + Duration::hours(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn inverted_window_is_malformed() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let c = claims(t0, t0);
        assert_eq!(validate_window(&c, t0), Err(TokenError::Malformed));
    }
}
