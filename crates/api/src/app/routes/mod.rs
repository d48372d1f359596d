use std::sync::Arc;

use axum::{Extension, Router, routing::post};

use crate::executor::GraphqlExecutor;

pub mod graphql;
pub mod system;

/// Router for the gated GraphQL endpoint.
pub fn router(executor: Arc<dyn GraphqlExecutor>) -> Router {
    Router::new()
        .route("/graphql", post(graphql::execute))
        .layer(Extension(executor))
}
