use chrono::{DateTime, Utc};
use serde::Serialize;

use crm_auth::ClaimSet;

use crate::directory::UserRecord;

// -------------------------
// Response DTOs
// -------------------------

/// Public view of a stored user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.to_string(),
            phone: user.phone.clone(),
            role: user.role.to_string(),
        }
    }
}

/// Result of `login` / `register`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPayload {
    pub token: String,
    pub user: UserView,
}

/// The caller as seen through their verified token (`me`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub id: String,
    pub name: String,
    pub role: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&ClaimSet> for IdentityView {
    fn from(claims: &ClaimSet) -> Self {
        Self {
            id: claims.subject().to_string(),
            name: claims.display_name().to_string(),
            role: claims.role().to_string(),
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        }
    }
}
