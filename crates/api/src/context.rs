use crm_auth::{ClaimSet, Role};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// No verified identity on this request.
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden for role '{0}'")]
    Forbidden(String),
}

/// Identity context for a request, attached by the authentication gate.
///
/// Every request that passes the gate carries exactly one of these as a
/// request extension: anonymous for bypassed operations, authenticated
/// otherwise. It is immutable; resolvers only read from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    identity: Option<ClaimSet>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    /// Wrap a verified claim set. `ClaimSet` can only be obtained from the
    /// token codec, so this cannot be fed unverified claims.
    pub fn authenticated(claims: ClaimSet) -> Self {
        Self {
            identity: Some(claims),
        }
    }

    /// Verified identity, or `None` for anonymous requests.
    pub fn identity(&self) -> Option<&ClaimSet> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Role of the caller. Anonymous requests and empty roles are
    /// `Unauthorized`.
    pub fn role(&self) -> Result<&Role, AccessError> {
        let claims = self.identity.as_ref().ok_or(AccessError::Unauthorized)?;
        let role = claims.role();
        if role.is_empty() {
            return Err(AccessError::Unauthorized);
        }
        Ok(role)
    }

    /// Require one of `allowed` roles (exact label match).
    pub fn require_any_role(&self, allowed: &[&str]) -> Result<&ClaimSet, AccessError> {
        let role = self.role()?;
        if !allowed.contains(&role.as_str()) {
            return Err(AccessError::Forbidden(role.to_string()));
        }
        self.identity.as_ref().ok_or(AccessError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crm_auth::{SigningSecret, TokenCodec};

    fn verified(role: &str) -> ClaimSet {
        let codec = TokenCodec::new(&SigningSecret::new("context-secret").unwrap());
        let now = Utc::now();
        let token = codec.issue("u1", "Alice", &Role::new(role.to_string()), now).unwrap();
        codec.verify(token.as_str(), now).unwrap()
    }

    #[test]
    fn anonymous_has_no_identity() {
        let ctx = RequestContext::anonymous();
        assert!(ctx.identity().is_none());
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.role(), Err(AccessError::Unauthorized));
        assert_eq!(ctx.require_any_role(&["admin"]), Err(AccessError::Unauthorized));
    }

    #[test]
    fn authenticated_exposes_role_and_identity() {
        let ctx = RequestContext::authenticated(verified("admin"));
        assert_eq!(ctx.role().unwrap().as_str(), "admin");

        let claims = ctx.identity().unwrap();
        assert_eq!(claims.subject(), "u1");
        assert_eq!(claims.display_name(), "Alice");
    }

    #[test]
    fn empty_role_is_unauthorized() {
        let ctx = RequestContext::authenticated(verified(""));
        assert!(ctx.identity().is_some());
        assert_eq!(ctx.role(), Err(AccessError::Unauthorized));
    }

    #[test]
    fn require_any_role_checks_label() {
        let ctx = RequestContext::authenticated(verified("sales"));
        assert!(ctx.require_any_role(&["admin", "sales"]).is_ok());
        assert_eq!(
            ctx.require_any_role(&["admin"]),
            Err(AccessError::Forbidden("sales".to_string()))
        );
    }
}
