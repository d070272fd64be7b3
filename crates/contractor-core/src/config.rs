//! Configuration management for Contractor
//!
//! Handles loading, saving, and managing application configuration
//! including the model provider, remote tool backends and turn settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language model provider
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Remote tool backends. Empty by default.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Turn orchestration settings
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    /// General application settings
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Config {
    /// Backends that should be connected on first catalog access
    pub fn enabled_backends(&self) -> Vec<BackendConfig> {
        self.backends.iter().filter(|b| b.enabled).cloned().collect()
    }
}

/// LLM Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider type: "openai", "anthropic", "gemini", etc.
    pub provider_type: String,
    /// API key (can be loaded from env)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable name for API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Model to use
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::openai()
    }
}

impl ProviderConfig {
    /// Create OpenAI provider config
    pub fn openai() -> Self {
        Self {
            provider_type: "openai".to_string(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "gpt-4o".to_string(),
        }
    }

    /// Create Anthropic provider config
    pub fn anthropic() -> Self {
        Self {
            provider_type: "anthropic".to_string(),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            model: "claude-sonnet-4-20250514".to_string(),
        }
    }

    /// Create Gemini provider config
    pub fn gemini() -> Self {
        Self {
            provider_type: "gemini".to_string(),
            api_key: None,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
            model: "gemini-1.5-pro".to_string(),
        }
    }

    /// Get the API key, checking environment variable if not set directly
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }

        if let Some(env_name) = &self.api_key_env {
            if let Ok(key) = std::env::var(env_name) {
                if !key.is_empty() {
                    return Some(key);
                }
            }
        }

        match self.provider_type.as_str() {
            "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
            "openai" => std::env::var("OPENAI_API_KEY").ok(),
            "gemini" | "google" => std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .ok(),
            "groq" => std::env::var("GROQ_API_KEY").ok(),
            "deepseek" => std::env::var("DEEPSEEK_API_KEY").ok(),
            "xai" | "grok" => std::env::var("XAI_API_KEY").ok(),
            _ => None,
        }
    }
}

/// A remote tool backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name, used in logs and routing
    pub name: String,
    /// How to reach the backend
    #[serde(flatten)]
    pub transport: BackendTransport,
    /// Whether to connect on startup
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Connection method for a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum BackendTransport {
    /// Server-sent events endpoint
    Sse { url: String },
    /// Local subprocess speaking newline-delimited JSON-RPC
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

impl BackendConfig {
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: BackendTransport::Sse { url: url.into() },
            enabled: true,
        }
    }

    pub fn stdio(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: BackendTransport::Stdio {
                command: command.into(),
                args: Vec::new(),
                env: HashMap::new(),
            },
            enabled: true,
        }
    }

    /// Set command arguments (stdio backends only)
    pub fn with_args(mut self, new_args: Vec<String>) -> Self {
        if let BackendTransport::Stdio { args, .. } = &mut self.transport {
            *args = new_args;
        }
        self
    }

    /// Add an environment variable (stdio backends only)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let BackendTransport::Stdio { env, .. } = &mut self.transport {
            env.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Human readable location of the backend
    pub fn endpoint(&self) -> String {
        match &self.transport {
            BackendTransport::Sse { url } => url.clone(),
            BackendTransport::Stdio { command, args, .. } if args.is_empty() => command.clone(),
            BackendTransport::Stdio { command, args, .. } => format!("{} {}", command, args.join(" ")),
        }
    }
}

/// Settings for a single conversational turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Number of trailing history messages included in each prompt
    pub history_window: usize,
    /// Token cap for each completion
    pub max_tokens: u32,
    /// Reply used when the model answers with neither text nor tool calls
    pub empty_reply_fallback: String,
    /// Reply used when the narration after tool calls is empty
    pub narration_fallback: String,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_tokens: 4000,
            empty_reply_fallback: "How can I help you refine your prompt contract today?"
                .to_string(),
            narration_fallback: "Done.".to_string(),
        }
    }
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Configuration manager for loading and saving config
pub struct ConfigManager {
    config_path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::with_path(config_path)
    }

    /// Create a config manager with a specific path
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            Config::default()
        };

        Ok(Self { config_path, config })
    }

    /// Get the default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("contractor").join("config.toml"))
    }

    fn load_from_path(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Add or replace a backend by name
    pub fn set_backend(&mut self, backend: BackendConfig) {
        self.config.backends.retain(|b| b.name != backend.name);
        self.config.backends.push(backend);
    }

    /// Remove a backend by name, returning whether it existed
    pub fn remove_backend(&mut self, name: &str) -> bool {
        let before = self.config.backends.len();
        self.config.backends.retain(|b| b.name != name);
        before != self.config.backends.len()
    }

    /// Get API key for the configured provider
    pub fn get_api_key(&self) -> Option<String> {
        self.config.provider.get_api_key()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            config_path: PathBuf::from("config.toml"),
            config: Config::default(),
        })
    }
}
