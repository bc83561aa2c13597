use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deployment environment. Selects rate limit presets and identity mode.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(anyhow::anyhow!("unknown environment '{}'", other)),
        }
    }
}

/// Server configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// port: 8080
/// data-dir: /var/lib/nodelease/data
/// environment: production
/// lease-ttl-secs: 259200
/// rpc-base-url: https://nodes.example.org
/// provider:
///   base-url: https://provisioner.example.org
///   timeout-secs: 30
///   status-timeout-secs: 5
/// chain-directory:
///   base-url: https://glacier-api.avax.network
///   network: fuji
/// auth:
///   tokens:
///     3b9f0c...: alice
/// rate-limits:
///   create:
///     max-requests: 3
///     window-secs: 3600
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default, alias = "lease-ttl-secs")]
    pub lease_ttl_secs: Option<u64>,
    #[serde(default, alias = "rpc-base-url")]
    pub rpc_base_url: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfigFile,
    #[serde(default, alias = "chain-directory")]
    pub chain_directory: ChainDirectoryConfigFile,
    #[serde(default)]
    pub auth: AuthConfigFile,
    #[serde(default, alias = "rate-limits")]
    pub rate_limits: RateLimitsConfigFile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfigFile {
    #[serde(default, alias = "base-url")]
    pub base_url: Option<String>,
    /// Shared secret. Prefer the environment variable over the file.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, alias = "timeout-secs")]
    pub timeout_secs: Option<u64>,
    #[serde(default, alias = "status-timeout-secs")]
    pub status_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainDirectoryConfigFile {
    /// Set to false to skip chain name enrichment entirely.
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default, alias = "base-url")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfigFile {
    /// Identity used for every request in development mode
    #[serde(default, alias = "dev-user")]
    pub dev_user: Option<String>,
    /// Bearer token -> user id, used in production mode
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitConfigFile {
    #[serde(alias = "max-requests")]
    pub max_requests: u32,
    #[serde(alias = "window-secs")]
    pub window_secs: u64,
}

/// Per-operation overrides of the environment's rate limit preset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitsConfigFile {
    #[serde(default)]
    pub list: Option<LimitConfigFile>,
    #[serde(default)]
    pub get: Option<LimitConfigFile>,
    #[serde(default)]
    pub create: Option<LimitConfigFile>,
    #[serde(default)]
    pub delete: Option<LimitConfigFile>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
