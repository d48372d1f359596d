use anyhow::Context;

use crm_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    crm_observability::init();

    let config = ApiConfig::from_env()?;
    if config.secret.is_weak() {
        tracing::warn!("JWT_SECRET is shorter than 32 bytes; use a longer random secret in production");
    }

    let app = crm_api::app::build_app(&config).await?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
