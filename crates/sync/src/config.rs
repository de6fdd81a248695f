//! Environment-driven configuration.

use std::env;
use std::time::Duration;

use nfse_cloud::StoreConfig;
use nfse_plugnotas::DEFAULT_BASE_URL;

use crate::error::SyncError;

const DEFAULT_REGION: &str = "sa-east-1";
const DEFAULT_BUCKET: &str = "plug-notas";
const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_LINK_TTL_SECS: u64 = 86_400;

/// Everything the worker needs to assemble a [`crate::SyncEngine`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub api_key: String,
    pub base_url: String,
    pub store: StoreConfig,
    pub page_size: usize,
    pub link_ttl: Duration,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        let store = StoreConfig {
            access_key: require("AWS_ACCESS_KEY")?,
            secret_key: require("AWS_SECRET_KEY")?,
            region: env::var("AWS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            bucket: env::var("AWS_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
            endpoint: env::var("AWS_ENDPOINT").ok(),
        };
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            api_key: require("PLUGNOTAS_API_KEY")?,
            base_url: env::var("PLUGNOTAS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            store,
            page_size: parse_or("PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            link_ttl: Duration::from_secs(parse_or("LINK_TTL_SECS", DEFAULT_LINK_TTL_SECS)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require(name: &str) -> Result<String, SyncError> {
    env::var(name).map_err(|_| SyncError::Config(format!("{name} is not set")))
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, SyncError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| SyncError::Config(format!("{name} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}
