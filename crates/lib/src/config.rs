//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.messenger/config.json`) and environment.
//! Every field has a default, so an empty `{}` file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook endpoint settings (path, verification secret, logging).
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Listener bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook endpoint (default 8080).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

/// Webhook endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Route serving both verification (GET) and event delivery (POST). Default "/webhook".
    #[serde(default = "default_webhook_path")]
    pub path: String,

    /// Secret compared against `hub.verify_token`. Overridden by MESSENGER_VERIFY_TOKEN env.
    pub verify_token: Option<String>,

    /// Log every raw POST body at info level.
    #[serde(default)]
    pub log_payloads: bool,

    /// Largest POST body accepted; longer bodies fail the read and get 400.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_server_port() -> u16 {
    8080
}

fn default_server_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            bind: default_server_bind(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: default_webhook_path(),
            verify_token: None,
            log_payloads: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Resolve the verification secret: env MESSENGER_VERIFY_TOKEN overrides config.
/// The value is used verbatim; only an empty value counts as unset.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    std::env::var("MESSENGER_VERIFY_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| {
            config
                .webhook
                .verify_token
                .clone()
                .filter(|s| !s.is_empty())
        })
}

/// Normalize the configured webhook path to start with a single '/'.
pub fn webhook_path(config: &Config) -> String {
    let p = config.webhook.path.trim().trim_start_matches('/');
    format!("/{}", p)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MESSENGER_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".messenger").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, or the default path (or MESSENGER_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
