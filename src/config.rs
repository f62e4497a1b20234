use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Bounds for any result limit, whether from a query or from `feeds.toml`.
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-feed request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Result limit applied by `/api/news` when the request gives none
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Filled from `ALLOWED_ORIGINS`, never from the file
    #[serde(skip, default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    pub feeds: Vec<FeedConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8010
}

fn default_request_timeout() -> u64 {
    10
}

fn default_limit() -> usize {
    5
}

fn default_allowed_origins() -> Vec<String> {
    vec![DEFAULT_ALLOWED_ORIGIN.to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&config.default_limit) {
            anyhow::bail!(
                "default_limit must be between {} and {}, got {}",
                MIN_LIMIT,
                MAX_LIMIT,
                config.default_limit
            );
        }
        Ok(config)
    }

    /// Overlay `ALLOWED_ORIGINS`, `HOST` and `PORT` from the environment.
    pub fn apply_env(self) -> anyhow::Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = parse_origins(&origins);
        }
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT '{}': {}", port, e))?;
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks. An all-blank list
/// falls back to the localhost origin.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        default_allowed_origins()
    } else {
        origins
    }
}
