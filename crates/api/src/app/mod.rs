//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (user directory, admin seeding)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: gate rejections and GraphQL error bodies

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::classifier::OperationClassifier;
use crate::config::ApiConfig;
use crate::executor::GraphqlExecutor;
use crate::middleware::{self, GateState};
use crate::session::SessionExecutor;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Router with the authentication gate in front of `/graphql`.
///
/// `executor` is whatever runs the GraphQL operation once the gate lets it
/// through; it receives the untouched body plus the request's identity.
pub fn router(gate: GateState, executor: Arc<dyn GraphqlExecutor>) -> Router {
    let gated = routes::router(executor).route_layer(axum::middleware::from_fn_with_state(
        gate,
        middleware::auth_gate,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(gated)
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let codec = Arc::new(config.token_codec()?);
    let gate = GateState::new(codec.clone(), OperationClassifier::new(config.bypass.clone()))
        .with_max_body_bytes(config.max_body_bytes);

    let directory = services::build_directory(config).await?;
    if let Some(admin) = &config.bootstrap_admin {
        services::seed_admin(directory.as_ref(), admin).await?;
    }

    let executor = Arc::new(SessionExecutor::new(directory, codec, config.default_role.clone()));
    Ok(router(gate, executor))
}
