use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::util::expand_home;

/// Root configuration for pipegram.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub sessions: SessionsConfig,
    pub bridge: BridgeConfig,
    pub media: MediaConfig,
}

impl Config {
    /// Get expanded sessions directory.
    pub fn sessions_path(&self) -> PathBuf {
        expand_home(&self.sessions.dir)
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.admin_token.trim().is_empty() {
            return Err(ConfigError::MissingAdminToken);
        }
        if self.bridge.url.trim().is_empty() {
            return Err(ConfigError::Invalid("bridge.url is empty".to_string()));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "bridge.timeoutSecs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct AuthConfig {
    pub admin_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsConfig {
    pub dir: String,
    /// 0 disables eviction.
    pub client_cache_capacity: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: "~/.pipegram/sessions".to_string(),
            client_cache_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8710".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaConfig {
    pub fetch_timeout_secs: u64,
    pub max_retries: u32,
    pub max_bytes: usize,
    pub user_agent: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 20,
            max_retries: 3,
            max_bytes: 100 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
        }
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `PIPEGRAM_CONFIG` env var: full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.pipegram/config.json` or `config_path`)
pub fn load_config_from_env(config_path: Option<&Path>) -> Config {
    if let Ok(json) = std::env::var("PIPEGRAM_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse PIPEGRAM_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(config_path);

    if let Ok(v) = std::env::var("ADMIN_TOKEN") {
        cfg.auth.admin_token = v;
    }

    // Server
    if let Ok(v) = std::env::var("HOST") {
        cfg.server.host = v;
    }
    if let Ok(v) = std::env::var("PORT") {
        match v.parse() {
            Ok(port) => cfg.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", v),
        }
    }

    // Sessions
    if let Ok(v) = std::env::var("PIPEGRAM_SESSIONS_DIR") {
        cfg.sessions.dir = v;
    }
    if let Ok(v) = std::env::var("PIPEGRAM_CLIENT_CACHE") {
        match v.parse() {
            Ok(cap) => cfg.sessions.client_cache_capacity = cap,
            Err(_) => tracing::warn!("Ignoring invalid PIPEGRAM_CLIENT_CACHE value: {}", v),
        }
    }

    // Bridge
    if let Ok(v) = std::env::var("PIPEGRAM_BRIDGE_URL") {
        cfg.bridge.url = v;
    }
    if let Ok(v) = std::env::var("PIPEGRAM_BRIDGE_API_KEY") {
        cfg.bridge.api_key = Some(v).filter(|k| !k.is_empty());
    }
    if let Ok(v) = std::env::var("PIPEGRAM_BRIDGE_TIMEOUT") {
        match v.parse() {
            Ok(secs) => cfg.bridge.timeout_secs = secs,
            Err(_) => tracing::warn!("Ignoring invalid PIPEGRAM_BRIDGE_TIMEOUT value: {}", v),
        }
    }

    cfg
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the pipegram data directory.
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pipegram")
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
