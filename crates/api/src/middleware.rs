//! Authentication gate for the GraphQL endpoint.
//!
//! Per request: buffer the body, classify the operation, then either forward
//! anonymously (bypass) or require and verify a bearer token. The buffered
//! bytes are put back into the request unchanged, so the execution engine
//! sees exactly what the client sent.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crm_auth::TokenCodec;

use crate::app::errors::GateRejection;
use crate::classifier::{Classification, OperationClassifier};
use crate::context::RequestContext;

/// Default cap on buffered request bodies (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct GateState {
    pub codec: Arc<TokenCodec>,
    pub classifier: Arc<OperationClassifier>,
    pub max_body_bytes: usize,
}

impl GateState {
    pub fn new(codec: Arc<TokenCodec>, classifier: OperationClassifier) -> Self {
        Self {
            codec,
            classifier: Arc::new(classifier),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub async fn auth_gate(
    State(state): State<GateState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, GateRejection> {
    let (parts, body) = req.into_parts();

    let bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "failed to buffer request body");
            GateRejection::Malformed
        })?;

    let classification = state.classifier.classify(&bytes).map_err(|e| {
        tracing::debug!(error = %e, "rejected malformed request");
        GateRejection::Malformed
    })?;

    let context = match classification {
        Classification::Public => {
            tracing::debug!(decision = "bypassed", "operation does not require a credential");
            RequestContext::anonymous()
        }
        Classification::Protected => {
            let token = extract_bearer(&parts.headers).inspect_err(|_| {
                tracing::debug!(decision = "rejected", reason = "missing credential");
            })?;

            let claims = state.codec.verify(token, Utc::now()).map_err(|e| {
                tracing::warn!(decision = "rejected", reason = %e, "invalid credential");
                GateRejection::InvalidCredential
            })?;

            tracing::debug!(
                decision = "authenticated",
                subject = claims.subject(),
                role = %claims.role(),
                "credential verified"
            );
            RequestContext::authenticated(claims)
        }
    };

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

/// Pull the token out of `Authorization`. An absent or empty header is a
/// missing credential; the `Bearer ` prefix is matched case-sensitively and a
/// value without it is passed through (and will fail verification).
fn extract_bearer(headers: &HeaderMap) -> Result<&str, GateRejection> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(GateRejection::MissingCredential)?;

    if header.is_empty() {
        return Err(GateRejection::MissingCredential);
    }

    let header = header
        .to_str()
        .map_err(|_| GateRejection::InvalidCredential)?;

    Ok(header.strip_prefix("Bearer ").unwrap_or(header))
}
