//! Seam between the gate and the GraphQL execution engine.

use async_trait::async_trait;
use axum::{body::Bytes, response::Response};

use crate::context::RequestContext;

/// Executes a GraphQL request that has already passed the authentication gate.
///
/// `body` is the request body exactly as the client sent it; `context` is the
/// identity the gate attached (anonymous for bypassed operations).
#[async_trait]
pub trait GraphqlExecutor: Send + Sync {
    async fn execute(&self, context: RequestContext, body: Bytes) -> Response;
}
