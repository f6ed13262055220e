//! TOML configuration parsing.
//!
//! Every section has defaults, so an absent or partial file still yields a
//! usable [`Config`]. [`load_config`] validates values after parsing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default location checked when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/sitter.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default = "default_rag_sources")]
    pub rag_sources: Vec<RagSourceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Browser origins allowed to call the API cross-origin, e.g.
    /// `"http://localhost:5173"`. Empty sends no CORS headers; `"*"` allows
    /// any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Settings for the remote generative model.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_grounding")]
    pub search_grounding: bool,
    /// Retries on 429/5xx/network errors. Zero means a single attempt.
    #[serde(default)]
    pub max_retries: u32,
    /// Local request timeout. Unset leaves timing to the transport.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            search_grounding: default_search_grounding(),
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "API_KEY".to_string()
}
fn default_search_grounding() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Files smaller than this are admitted whatever their type.
    #[serde(default = "default_max_fallback_bytes")]
    pub max_fallback_bytes: u64,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_fallback_bytes: default_max_fallback_bytes(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_max_fallback_bytes() -> u64 {
    10 * 1024 * 1024
}

/// Seed entry for the RAG source registry.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RagSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn default_rag_sources() -> Vec<RagSourceConfig> {
    vec![RagSourceConfig {
        name: "Adobe Commerce (Magento)".to_string(),
        url: "https://experienceleague.adobe.com/en/docs/commerce".to_string(),
        active: true,
    }]
}

impl Config {
    /// Built-in defaults, used when no configuration file exists.
    pub fn minimal() -> Self {
        Self {
            rag_sources: default_rag_sources(),
            ..Self::default()
        }
    }
}

/// Resolve the configuration for the CLI.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is used
/// when present and [`Config::minimal`] otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(&default)
            } else {
                tracing::debug!("no config at {}, using defaults", default.display());
                Ok(Config::minimal())
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.agent.model.trim().is_empty() {
        anyhow::bail!("agent.model must not be empty");
    }
    if !config.agent.base_url.starts_with("http") {
        anyhow::bail!(
            "agent.base_url must be an http(s) URL, got '{}'",
            config.agent.base_url
        );
    }
    if config.agent.api_key_env.trim().is_empty() {
        anyhow::bail!("agent.api_key_env must name an environment variable");
    }
    if config.agent.timeout_secs == Some(0) {
        anyhow::bail!("agent.timeout_secs must be > 0 when set");
    }

    for origin in &config.server.cors_origins {
        let valid = origin == "*"
            || ((origin.starts_with("http://") || origin.starts_with("https://"))
                && !origin.ends_with('/')
                && origin.parse::<axum::http::HeaderValue>().is_ok());
        if !valid {
            anyhow::bail!(
                "server.cors_origins entries must be '*' or an origin like 'http://localhost:5173', got '{}'",
                origin
            );
        }
    }

    if config.ingest.max_fallback_bytes == 0 {
        anyhow::bail!("ingest.max_fallback_bytes must be > 0");
    }

    for source in &config.rag_sources {
        if source.name.trim().is_empty() {
            anyhow::bail!("rag_sources entries must have a name");
        }
        if !(source.url.starts_with("http://") || source.url.starts_with("https://")) {
            anyhow::bail!(
                "rag source '{}' has an invalid url: '{}'",
                source.name,
                source.url
            );
        }
    }

    Ok(())
}
