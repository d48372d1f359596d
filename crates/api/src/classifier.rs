//! Operation classification: may this request skip authentication?

use thiserror::Error;

use crate::graphql::{self, GraphqlRequest};

/// Which operations are allowed through without a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BypassPolicy {
    /// Public only when every root field of the selected operation is one of
    /// these names (exact, case-sensitive).
    Allowlist(Vec<String>),
    /// Public when the raw query text contains this substring anywhere.
    /// Coarse: `{ loginHistory { ... } }` or a comment mentioning the word
    /// also match.
    Keyword(String),
}

impl Default for BypassPolicy {
    fn default() -> Self {
        Self::Allowlist(vec!["login".to_string(), "register".to_string()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Forward without a credential.
    Public,
    /// A valid bearer credential is required.
    Protected,
}

impl Classification {
    pub fn requires_auth(self) -> bool {
        matches!(self, Classification::Protected)
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The body is not a GraphQL JSON envelope with a string `query`.
    #[error("invalid GraphQL request format: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct OperationClassifier {
    policy: BypassPolicy,
}

impl OperationClassifier {
    pub fn new(policy: BypassPolicy) -> Self {
        Self { policy }
    }

    /// Classify a raw request body. The payload is only borrowed.
    pub fn classify(&self, payload: &[u8]) -> Result<Classification, ClassifyError> {
        let request: GraphqlRequest = serde_json::from_slice(payload)?;

        let public = match &self.policy {
            BypassPolicy::Keyword(keyword) => request.query.contains(keyword.as_str()),
            BypassPolicy::Allowlist(allowed) => {
                Self::only_allowed_fields(&request, allowed)
            }
        };

        Ok(if public {
            Classification::Public
        } else {
            Classification::Protected
        })
    }

    /// Convenience form of [`OperationClassifier::classify`].
    pub fn requires_auth(&self, payload: &[u8]) -> Result<bool, ClassifyError> {
        self.classify(payload).map(Classification::requires_auth)
    }

    fn only_allowed_fields(request: &GraphqlRequest, allowed: &[String]) -> bool {
        // Anything we cannot summarise confidently stays protected.
        let Ok(operations) = graphql::parse_document(&request.query) else {
            return false;
        };
        let Some(operation) = graphql::select_operation(&operations, request.operation_name.as_deref())
        else {
            return false;
        };

        !operation.has_root_spread
            && !operation.root_fields.is_empty()
            && operation
                .root_fields
                .iter()
                .all(|field| allowed.iter().any(|name| *name == field.name))
    }
}
