//! Startup configuration.
//!
//! Everything here is resolved once, before the router is built, and then
//! handed to the services that need it. Nothing reads the environment at
//! request time.

use std::fmt;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use crate::session::TokenCarrier;
use crate::tokens::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

/// Fallback signing secrets. Only used by tests and when
/// `FOLIO_INSECURE_DEV_SECRETS=1` is set explicitly.
pub const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
pub const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";

/// Placeholder secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &[
    DEV_ACCESS_SECRET,
    DEV_REFRESH_SECRET,
    "your-secret-key-change-in-production",
    "your-refresh-secret-key-change-in-production",
    "change-me",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is unset")]
    MissingSecret(&'static str),

    #[error("{0} is still a placeholder value")]
    PlaceholderSecret(&'static str),

    #[error("access and refresh signing secrets must differ")]
    SharedSecret,

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Signing material and lifetimes for the token service.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Builds a config with the standard lifetimes (60 minutes / 7 days).
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let access_secret = access_secret.into();
        let refresh_secret = refresh_secret.into();

        if access_secret.is_empty() {
            return Err(ConfigError::MissingSecret("FOLIO_ACCESS_SECRET"));
        }
        if refresh_secret.is_empty() {
            return Err(ConfigError::MissingSecret("FOLIO_REFRESH_SECRET"));
        }
        if access_secret == refresh_secret {
            return Err(ConfigError::SharedSecret);
        }

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        })
    }

    /// Config built from the fallback literals.
    pub fn insecure_dev() -> Self {
        Self {
            access_secret: DEV_ACCESS_SECRET.to_string(),
            refresh_secret: DEV_REFRESH_SECRET.to_string(),
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Argon2id cost parameters for newly created hashes. Existing hashes keep
/// verifying with whatever parameters are embedded in them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

/// Which uploads are accepted.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Lowercase extensions without the dot.
    pub allowed_types: Vec<String>,
    pub max_bytes: usize,
}

impl UploadPolicy {
    pub fn allows(&self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        self.allowed_types.iter().any(|t| *t == extension)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: vec!["pdf".to_string(), "docx".to_string()],
            max_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub carrier: TokenCarrier,
    pub cookie_secure: bool,
    pub tokens: TokenConfig,
    pub hashing: HashingParams,
    pub uploads: UploadPolicy,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// | Variable                     | Default          |
    /// |------------------------------|------------------|
    /// | `FOLIO_HOST`                 | `0.0.0.0`        |
    /// | `FOLIO_PORT`                 | `3000`           |
    /// | `FOLIO_DB_PATH`              | `folio.db`       |
    /// | `FOLIO_UPLOAD_DIR`           | `./uploads`      |
    /// | `FOLIO_MAX_UPLOAD_MB`        | `50`             |
    /// | `FOLIO_ALLOWED_FILE_TYPES`   | `pdf,docx`       |
    /// | `FOLIO_TOKEN_CARRIER`        | `cookie`         |
    /// | `FOLIO_COOKIE_SECURE`        | `false`          |
    /// | `FOLIO_ACCESS_SECRET`        | required         |
    /// | `FOLIO_REFRESH_SECRET`       | required         |
    /// | `FOLIO_INSECURE_DEV_SECRETS` | `0`              |
    /// | `FOLIO_ARGON2_MEMORY_KIB`    | argon2 default   |
    /// | `FOLIO_ARGON2_ITERATIONS`    | argon2 default   |
    /// | `FOLIO_ARGON2_PARALLELISM`   | argon2 default   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = parse_var(&lookup, "FOLIO_PORT", 3000u16)?;
        let max_upload_mb = parse_var(&lookup, "FOLIO_MAX_UPLOAD_MB", 50usize)?;
        let max_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| ConfigError::Invalid {
                name: "FOLIO_MAX_UPLOAD_MB",
                value: max_upload_mb.to_string(),
            })?;

        let carrier_raw = var("FOLIO_TOKEN_CARRIER", "cookie");
        let carrier = TokenCarrier::parse(&carrier_raw).ok_or(ConfigError::Invalid {
            name: "FOLIO_TOKEN_CARRIER",
            value: carrier_raw,
        })?;

        let allowed_types: Vec<String> = var("FOLIO_ALLOWED_FILE_TYPES", "pdf,docx")
            .split(',')
            .map(|t| t.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let defaults = HashingParams::default();
        let hashing = HashingParams {
            memory_kib: parse_var(&lookup, "FOLIO_ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_var(&lookup, "FOLIO_ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parse_var(&lookup, "FOLIO_ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let insecure_dev = flag(&lookup, "FOLIO_INSECURE_DEV_SECRETS")?;
        let tokens = resolve_token_config(&lookup, insecure_dev)?;

        Ok(Self {
            host: var("FOLIO_HOST", "0.0.0.0"),
            port,
            db_path: var("FOLIO_DB_PATH", "folio.db").into(),
            upload_dir: var("FOLIO_UPLOAD_DIR", "./uploads").into(),
            carrier,
            cookie_secure: flag(&lookup, "FOLIO_COOKIE_SECURE")?,
            tokens,
            hashing,
            uploads: UploadPolicy {
                allowed_types,
                max_bytes,
            },
        })
    }
}

fn resolve_token_config<F>(lookup: &F, insecure_dev: bool) -> Result<TokenConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let access = lookup("FOLIO_ACCESS_SECRET").filter(|s| !s.is_empty());
    let refresh = lookup("FOLIO_REFRESH_SECRET").filter(|s| !s.is_empty());

    if insecure_dev {
        warn!("FOLIO_INSECURE_DEV_SECRETS is set; unset signing secrets fall back to built-in placeholders");
        return TokenConfig::new(
            access.unwrap_or_else(|| DEV_ACCESS_SECRET.to_string()),
            refresh.unwrap_or_else(|| DEV_REFRESH_SECRET.to_string()),
        );
    }

    let access = access.ok_or(ConfigError::MissingSecret("FOLIO_ACCESS_SECRET"))?;
    let refresh = refresh.ok_or(ConfigError::MissingSecret("FOLIO_REFRESH_SECRET"))?;
    if PLACEHOLDER_SECRETS.contains(&access.as_str()) {
        return Err(ConfigError::PlaceholderSecret("FOLIO_ACCESS_SECRET"));
    }
    if PLACEHOLDER_SECRETS.contains(&refresh.as_str()) {
        return Err(ConfigError::PlaceholderSecret("FOLIO_REFRESH_SECRET"));
    }

    TokenConfig::new(access, refresh)
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn flag<F>(lookup: &F, name: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") | Some("0") | Some("false") => Ok(false),
        Some("1") | Some("true") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
        }),
    }
}
