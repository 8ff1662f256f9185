use anyhow::Context;
use foodcart_types::domain::geo::CachePolicy;
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GEOCODER_URL: &str = "https://geocode-maps.yandex.ru";

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Extra attempts after the first one, for transient failures only.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_backoff: Duration,
}

impl GeocoderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GEOCODER_URL.into(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub geocoder: GeocoderConfig,
    pub cache_policy: CachePolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let server_port = env::var("SERVER_PORT").unwrap_or_else(|_| "3000".into());
        let database_url = env::var("DATABASE_URL").ok();
        let api_key = env::var("YANDEX_API_KEY").context("YANDEX_API_KEY must be set")?;

        let geocoder = GeocoderConfig {
            api_key,
            base_url: env::var("GEOCODER_URL").unwrap_or_else(|_| DEFAULT_GEOCODER_URL.into()),
            timeout: Duration::from_millis(env_or("GEOCODER_TIMEOUT_MS", 5000)?),
            max_retries: env_or("GEOCODER_MAX_RETRIES", 2)?,
            retry_backoff: Duration::from_millis(env_or("GEOCODER_RETRY_BACKOFF_MS", 200)?),
        };

        let cache_policy = cache_policy(
            env_or("GEOCODE_CACHE_TTL_SECS", 30 * 24 * 60 * 60)?,
            env_or("GEOCODE_CACHE_MAX_ENTRIES", 10_000)?,
        )?;

        Ok(Self {
            server_port,
            database_url,
            geocoder,
            cache_policy,
        })
    }
}

/// Zero switches a limit off.
fn cache_policy(ttl_secs: u64, max_entries: u64) -> anyhow::Result<CachePolicy> {
    let max_ttl_secs = CachePolicy::MAX_TTL.as_secs();
    if ttl_secs > max_ttl_secs {
        anyhow::bail!("GEOCODE_CACHE_TTL_SECS must be at most {max_ttl_secs}, got {ttl_secs}");
    }
    Ok(CachePolicy {
        ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        max_entries: (max_entries > 0).then_some(max_entries),
    })
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
