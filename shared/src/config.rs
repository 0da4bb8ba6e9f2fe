use std::env;
use thiserror::Error;

const DEFAULT_TABLE_NAME: &str = "protigo";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 168; // 7 days
pub const MAX_TOKEN_TTL_HOURS: i64 = 8760; // 1 year
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";
const DEFAULT_IMAGE_BUCKET: &str = "protigo-food-images";
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime configuration, loaded once per cold start
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub allowed_origins: Vec<String>,
    pub image_bucket: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table_name = lookup("TABLE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        let token_secret = lookup("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?;
        if token_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid {
                key: "TOKEN_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_BYTES),
            });
        }

        let token_ttl_hours = match lookup("TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| (1..=MAX_TOKEN_TTL_HOURS).contains(hours))
                .ok_or_else(|| ConfigError::Invalid {
                    key: "TOKEN_TTL_HOURS",
                    reason: format!(
                        "expected between 1 and {} hours, got '{}'",
                        MAX_TOKEN_TTL_HOURS, raw
                    ),
                })?,
            None => DEFAULT_TOKEN_TTL_HOURS,
        };

        let allowed_origins = parse_origins(
            &lookup("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );

        let image_bucket = lookup("IMAGE_BUCKET")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_BUCKET.to_string());

        tracing::info!(
            table_name = %table_name,
            token_ttl_hours,
            origins = allowed_origins.len(),
            image_bucket = %image_bucket,
            "Configuration loaded"
        );

        Ok(Self {
            table_name,
            token_secret,
            token_ttl_hours,
            allowed_origins,
            image_bucket,
        })
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.to_string())
        .collect()
}
