//! Gateway configuration, loaded from the environment.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use anyhow::{Context, bail};
use chrono::Duration;

use crm_auth::{DEFAULT_TOKEN_TTL_SECS, Role, SigningSecret, TokenCodec};

use crate::classifier::BypassPolicy;
use crate::middleware::DEFAULT_MAX_BODY_BYTES;

/// Upper bound for `CRM_TOKEN_TTL_SECS` (one year).
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Admin account seeded at startup when the directory has no user with this
/// email yet.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub secret: SigningSecret,
    pub host: IpAddr,
    pub port: u16,
    pub token_ttl: Duration,
    pub bypass: BypassPolicy,
    pub max_body_bytes: usize,
    pub default_role: Role,
    pub database_url: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        let secret = SigningSecret::new(secret).context("JWT_SECRET")?;

        let host = parse_or(get("CRM_BIND_HOST"), "CRM_BIND_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or(get("PORT"), "PORT", 8080u16)?;

        let ttl_secs = parse_or(get("CRM_TOKEN_TTL_SECS"), "CRM_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            bail!("CRM_TOKEN_TTL_SECS must be between 1 and {MAX_TOKEN_TTL_SECS}, got {ttl_secs}");
        }
        let token_ttl = Duration::try_seconds(ttl_secs)
            .with_context(|| format!("CRM_TOKEN_TTL_SECS out of range: {ttl_secs}"))?;

        let bypass = match get("CRM_BYPASS_POLICY").as_deref().map(str::trim) {
            None | Some("allowlist") => match get("CRM_BYPASS_OPERATIONS") {
                Some(list) => BypassPolicy::Allowlist(
                    list.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect(),
                ),
                None => BypassPolicy::default(),
            },
            Some("keyword") => {
                BypassPolicy::Keyword(get("CRM_BYPASS_KEYWORD").unwrap_or_else(|| "login".to_string()))
            }
            Some(other) => bail!("CRM_BYPASS_POLICY must be 'allowlist' or 'keyword', got '{other}'"),
        };

        let max_body_bytes = parse_or(get("CRM_MAX_BODY_BYTES"), "CRM_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        let default_role = Role::new(
            get("CRM_DEFAULT_ROLE")
                .map(|r| r.trim().to_string())
                .unwrap_or_else(|| "sales".to_string()),
        );

        let bootstrap_admin = match (get("CRM_BOOTSTRAP_ADMIN_EMAIL"), get("CRM_BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                name: get("CRM_BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            _ => bail!("CRM_BOOTSTRAP_ADMIN_EMAIL and CRM_BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            secret,
            host,
            port,
            token_ttl,
            bypass,
            max_body_bytes,
            default_role,
            database_url: get("DB_URL"),
            bootstrap_admin,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn token_codec(&self) -> anyhow::Result<TokenCodec> {
        TokenCodec::new(&self.secret)
            .with_ttl(self.token_ttl)
            .context("CRM_TOKEN_TTL_SECS")
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
