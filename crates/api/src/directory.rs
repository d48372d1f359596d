//! User directory: the persistence collaborator consulted when issuing tokens.
//!
//! The gate itself never touches storage; only the session resolvers look up
//! (or create) the principal a token is issued for.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crm_auth::{PasswordHash, Role};
use crm_core::{DomainError, EmailAddress, UserId};

/// Stored user, as needed for authentication.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: PasswordHash,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("user store unavailable: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError>;

    /// Insert a new user. Fails with `DomainError::Conflict` when the email
    /// is already registered.
    async fn insert(&self, user: UserRecord) -> Result<(), DirectoryError>;

    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError>;
}

/// Process-local directory (dev/test).
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned<T>(_: T) -> DirectoryError {
        DirectoryError::Backend("user directory lock poisoned".to_string())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(Self::poisoned)?;
        Ok(users.values().find(|u| &u.email == email).cloned())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(Self::poisoned)?;
        Ok(users.get(&id).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<(), DirectoryError> {
        let mut users = self.users.write().map_err(Self::poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(DomainError::conflict(format!("email '{}' is already registered", user.email)).into());
        }
        if users.contains_key(&user.id) {
            return Err(DomainError::conflict(format!("user '{}' already exists", user.id)).into());
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let users = self.users.read().map_err(Self::poisoned)?;
        let mut all: Vec<UserRecord> = users.values().cloned().collect();
        all.sort_by(|a, b| a.email.as_str().cmp(b.email.as_str()));
        Ok(all)
    }
}

#[cfg(feature = "postgres")]
pub use postgres::PgUserDirectory;

#[cfg(feature = "postgres")]
mod postgres {
    use std::str::FromStr;

    use async_trait::async_trait;
    use sqlx::{PgPool, Row, postgres::PgRow};
    use tracing::Instrument;

    use crm_auth::{PasswordHash, Role};
    use crm_core::{DomainError, EmailAddress, UserId};

    use super::{DirectoryError, UserDirectory, UserRecord};

    /// Postgres-backed directory over the CRM `users` table.
    ///
    /// Expected columns: `id` (text), `name`, `email`, `phone`, `role`,
    /// `password` (stored hash), `created_at`, `updated_at`, `deleted_at`.
    /// Soft-deleted rows are invisible. The schema is owned by migrations
    /// elsewhere.
    pub struct PgUserDirectory {
        pool: PgPool,
    }

    impl PgUserDirectory {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        fn backend(err: sqlx::Error) -> DirectoryError {
            DirectoryError::Backend(err.to_string())
        }

        fn from_row(row: &PgRow) -> Result<UserRecord, DirectoryError> {
            let id: String = row.try_get("id").map_err(Self::backend)?;
            let email: String = row.try_get("email").map_err(Self::backend)?;
            let password: String = row.try_get("password").map_err(Self::backend)?;
            let phone: Option<String> = row.try_get("phone").map_err(Self::backend)?;
            let role: String = row.try_get("role").map_err(Self::backend)?;

            Ok(UserRecord {
                id: UserId::from_str(&id)?,
                name: row.try_get("name").map_err(Self::backend)?,
                email: EmailAddress::parse(&email)?,
                phone: phone.filter(|p| !p.is_empty()),
                role: Role::new(role),
                password_hash: PasswordHash::parse(&password)
                    .map_err(|e| DomainError::validation(format!("user {id}: {e}")))?,
            })
        }
    }

    #[async_trait]
    impl UserDirectory for PgUserDirectory {
        async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, DirectoryError> {
            let row = sqlx::query(
                r#"
                SELECT id, name, email, phone, role, password
                FROM users
                WHERE lower(email) = $1 AND deleted_at IS NULL
                LIMIT 1
                "#,
            )
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .instrument(tracing::debug_span!("users.find_by_email"))
            .await
            .map_err(Self::backend)?;

            row.as_ref().map(Self::from_row).transpose()
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
            let row = sqlx::query(
                r#"
                SELECT id, name, email, phone, role, password
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .instrument(tracing::debug_span!("users.find_by_id"))
            .await
            .map_err(Self::backend)?;

            row.as_ref().map(Self::from_row).transpose()
        }

        async fn insert(&self, user: UserRecord) -> Result<(), DirectoryError> {
            let result = sqlx::query(
                r#"
                INSERT INTO users (id, name, email, phone, role, password, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, now(), now())
                "#,
            )
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(user.email.as_str())
            .bind(user.phone.clone().unwrap_or_default())
            .bind(user.role.as_str())
            .bind(user.password_hash.encode())
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(DomainError::conflict(
                    format!("email '{}' is already registered", user.email),
                )
                .into()),
                Err(e) => Err(Self::backend(e)),
            }
        }

        async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
            let rows = sqlx::query(
                r#"
                SELECT id, name, email, phone, role, password
                FROM users
                WHERE deleted_at IS NULL
                ORDER BY email
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(Self::backend)?;

            rows.iter().map(Self::from_row).collect()
        }
    }
}
