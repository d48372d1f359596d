//! Infrastructure wiring: user directory selection and startup seeding.

use std::sync::Arc;

use crm_auth::{PasswordHash, Role};
use crm_core::{EmailAddress, UserId};

use crate::config::{ApiConfig, BootstrapAdmin};
use crate::directory::{InMemoryUserDirectory, UserDirectory, UserRecord};

/// Pick the user directory backend.
///
/// With the `postgres` feature and `DB_URL` set, users live in Postgres.
/// Otherwise an in-memory directory is used (lost on restart).
pub async fn build_directory(config: &ApiConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    if let Some(url) = &config.database_url {
        return connect_postgres(url).await;
    }

    tracing::warn!("using in-memory user directory; users are lost on restart");
    Ok(Arc::new(InMemoryUserDirectory::new()))
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> anyhow::Result<Arc<dyn UserDirectory>> {
    use anyhow::Context;

    let pool = sqlx::PgPool::connect(url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::info!("using postgres user directory");
    Ok(Arc::new(crate::directory::PgUserDirectory::new(pool)))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> anyhow::Result<Arc<dyn UserDirectory>> {
    tracing::warn!("DB_URL is set but the postgres feature is disabled; using in-memory user directory");
    Ok(Arc::new(InMemoryUserDirectory::new()))
}

/// Create the bootstrap admin unless a user with that email already exists.
pub async fn seed_admin(directory: &dyn UserDirectory, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    let email = EmailAddress::parse(&admin.email)?;
    if directory.find_by_email(&email).await?.is_some() {
        tracing::debug!(email = %email, "bootstrap admin already present");
        return Ok(());
    }

    let user = UserRecord {
        id: UserId::new(),
        name: admin.name.clone(),
        email,
        phone: None,
        role: Role::ADMIN,
        password_hash: PasswordHash::derive(&admin.password)?,
    };
    let id = user.id;
    directory.insert(user).await?;

    tracing::info!(user_id = %id, "seeded bootstrap admin");
    Ok(())
}
