//! `crm-auth`: credential boundary for the CRM gateway.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies identity tokens, models the verified claim set, and hashes
//! passwords. Deciding *when* a credential is required lives in `crm-api`.

pub mod claims;
pub mod codec;
pub mod password;
pub mod roles;
pub mod secret;

pub use claims::{ClaimSet, TokenError};
pub use codec::{DEFAULT_TOKEN_TTL_SECS, IdentityToken, TokenCodec};
pub use password::{PasswordError, PasswordHash, check_password_policy};
pub use roles::Role;
pub use secret::{SecretError, SigningSecret};
