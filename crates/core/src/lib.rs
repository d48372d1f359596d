//! `crm-core`: shared primitives for the CRM gateway.
//!
//! Pure types only; no transport or storage concerns.

pub mod email;
pub mod error;
pub mod id;

pub use email::EmailAddress;
pub use error::DomainError;
pub use id::UserId;
