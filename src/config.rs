use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub links: LinkConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached link snapshots (LRU beyond this).
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
    /// Sliding TTL in seconds, reset on every read.
    #[serde(default = "default_cache_idle_ttl")]
    pub idle_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_generation_attempts")]
    pub max_generation_attempts: usize,
    /// Where unresolvable codes are redirected to.
    #[serde(default = "default_home_url")]
    pub home_url: String,
    /// Lifetime granted to anonymously created links, in seconds.
    #[serde(default = "default_anonymous_ttl")]
    pub anonymous_ttl_secs: u64,
    /// How many links a single anonymous IP may hold.
    #[serde(default = "default_anonymous_limit")]
    pub anonymous_link_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// GeoIP lookup endpoint, `{ip}` is substituted.
    #[serde(default = "default_geoip_api_url")]
    pub geoip_api_url: String,
    /// Bounded click queue capacity; overflow drops the click.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Number of pipeline workers. 0 = one per CPU.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    /// Upper bound for a single click persist attempt.
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_cache_idle_ttl() -> u64 {
    3 * 24 * 60 * 60
}

fn default_code_length() -> usize {
    6
}

fn default_generation_attempts() -> usize {
    10
}

// Absolute by design: "/" would make the fallback redirect point at the
// redirect handler itself.
fn default_home_url() -> String {
    "https://snaplink.dev".to_string()
}

fn default_anonymous_ttl() -> u64 {
    3 * 24 * 60 * 60
}

fn default_anonymous_limit() -> u64 {
    3
}

fn default_geoip_api_url() -> String {
    "http://ip-api.com/json/{ip}?fields=status,country,city,regionName,timezone,isp,org,as".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_base_ms() -> u64 {
    100
}

fn default_persist_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_cache_capacity(),
            idle_ttl_secs: default_cache_idle_ttl(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            max_generation_attempts: default_generation_attempts(),
            home_url: default_home_url(),
            anonymous_ttl_secs: default_anonymous_ttl(),
            anonymous_link_limit: default_anonymous_limit(),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            geoip_api_url: default_geoip_api_url(),
            queue_capacity: default_queue_capacity(),
            workers: 0,
            retry_max_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            persist_timeout_ms: default_persist_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from `SNAPLINK_CONFIG` (or `snaplink.toml` in the
    /// working directory), then apply environment overrides on top.
    pub fn load() -> Result<Self> {
        let path = env::var("SNAPLINK_CONFIG").unwrap_or_else(|_| "snaplink.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            debug!("Loading configuration from {}", path);
            let raw = fs::read_to_string(&path)?;
            toml::from_str(&raw)?
        } else {
            debug!("No config file at {}, using defaults", path);
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Invalid SERVER_PORT value: {}", port),
            }
        }
        if let Ok(url) = env::var("HOME_URL") {
            self.links.home_url = url;
        }
        if let Ok(url) = env::var("GEOIP_API_URL") {
            self.analytics.geoip_api_url = url;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Effective pipeline worker count.
    pub fn pipeline_workers(&self) -> usize {
        if self.analytics.workers == 0 {
            num_cpus::get()
        } else {
            self.analytics.workers
        }
    }
}
