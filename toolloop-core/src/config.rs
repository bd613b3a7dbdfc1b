//! Configuration types for toolloop

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::AgentConfig;
use crate::context::ContextConfig;
use crate::error::{Result, ToolloopError};
use crate::tools::ToolExecutorConfig;

/// Default configuration file, looked up in the working directory
pub const CONFIG_FILE: &str = "toolloop.toml";

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "TOOLLOOP_CONFIG_PATH";

/// Prefix of environment overrides; nested keys are separated by `__`,
/// e.g. `TOOLLOOP_AGENT__MAX_ITERATIONS=5`
pub const ENV_PREFIX: &str = "TOOLLOOP_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolloopConfig {
    pub llm: LLMProviderConfig,
    pub agent: AgentConfig,
    pub context: ContextConfig,
    pub tools: ToolExecutorConfig,

    /// Root directory for the built-in file and shell tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProvider,

    /// Model name; the provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key (if needed, prefer env vars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for compatible endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// LLM provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    #[default]
    OpenAI,
}

impl ToolloopConfig {
    /// Load configuration.
    ///
    /// Loads in this order, later layers winning:
    /// 1. Default configuration
    /// 2. `toolloop.toml` in the working directory
    /// 3. The file named by `TOOLLOOP_CONFIG_PATH`
    /// 4. `TOOLLOOP_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or the result
    /// fails validation.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ToolloopConfig::default()))
            .merge(Toml::file(CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolloopError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        Self::from_figment(
            Figment::from(Serialized::defaults(ToolloopConfig::default())).merge(Toml::file(path)),
        )
    }

    /// Extract and validate configuration from any figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: ToolloopConfig = figment.extract().map_err(|e| {
            ToolloopError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero iteration cap, a compaction threshold
    /// outside (0, 1] or a zero context window.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(ToolloopError::Configuration(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.context.threshold > 0.0 && self.context.threshold <= 1.0) {
            return Err(ToolloopError::Configuration(format!(
                "context.threshold must be in (0, 1], got {}",
                self.context.threshold
            )));
        }
        if self.context.context_window == 0 {
            return Err(ToolloopError::Configuration(
                "context.context_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
