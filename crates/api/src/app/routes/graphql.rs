use std::sync::Arc;

use axum::{body::Bytes, extract::Extension, response::Response};

use crate::context::RequestContext;
use crate::executor::GraphqlExecutor;

/// Hand the (gate-approved) request to the execution engine.
pub async fn execute(
    Extension(executor): Extension<Arc<dyn GraphqlExecutor>>,
    Extension(context): Extension<RequestContext>,
    body: Bytes,
) -> Response {
    executor.execute(context, body).await
}
