//! Application configuration: search, language model and logging.
//!
//! Loaded from TOML. Every section has defaults so a partial file (or no
//! file at all) works. Secrets can be supplied through environment
//! variables instead of the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use threadlens_search::SearchConfig;

use crate::error::{AppError, Result};

/// Overrides `search.client_id`.
pub const ENV_CLIENT_ID: &str = "THREADLENS_CLIENT_ID";
/// Overrides `search.client_secret`.
pub const ENV_CLIENT_SECRET: &str = "THREADLENS_CLIENT_SECRET";
/// Overrides `llm.api_key`.
pub const ENV_LLM_API_KEY: &str = "THREADLENS_LLM_API_KEY";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "threadlens=info,threadlens_search=info";

/// Configuration for the OpenAI-compatible chat-completions endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL, without the `/v1/chat/completions` suffix.
    pub base_url: String,
    /// Bearer token. Local servers usually need none.
    pub api_key: Option<String>,
    /// Model identifier sent with each request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Whole-request timeout.
    pub timeout_seconds: u64,
    /// How many ranked results are rendered into the prompt.
    pub max_results_in_prompt: usize,
    /// Per-result excerpt bound in the prompt, in characters.
    pub max_excerpt_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.2,
            max_tokens: 1200,
            timeout_seconds: 60,
            max_results_in_prompt: 8,
            max_excerpt_chars: 600,
        }
    }
}

// The key is redacted so configs can be logged.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_results_in_prompt", &self.max_results_in_prompt)
            .field("max_excerpt_chars", &self.max_excerpt_chars)
            .finish()
    }
}

impl LlmConfig {
    /// Validates this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config("llm.base_url must not be empty".into()));
        }
        if self.model.trim().is_empty() {
            return Err(AppError::Config("llm.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(AppError::Config(
                "llm.max_tokens must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(AppError::Config(
                "llm.timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.max_results_in_prompt == 0 {
            return Err(AppError::Config(
                "llm.max_results_in_prompt must be greater than 0".into(),
            ));
        }
        if self.max_excerpt_chars < 40 {
            return Err(AppError::Config(
                "llm.max_excerpt_chars must be at least 40".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Forum search settings.
    pub search: SearchConfig,
    /// Language-model settings.
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.into(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/threadlens/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("threadlens-config"))
            .join("threadlens")
            .join("config.toml")
    }

    /// Load the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise. Environment overrides
    /// are applied and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path();
                if default_path.is_file() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply secret overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply secret overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(id) = get(ENV_CLIENT_ID) {
            self.search.client_id = Some(id);
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.search.client_secret = Some(secret);
        }
        if let Some(key) = get(ENV_LLM_API_KEY) {
            self.llm.api_key = Some(key);
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.llm.validate()?;
        if self.log_filter.trim().is_empty() {
            return Err(AppError::Config("log_filter must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.llm.model = "local-model".into();
        config.search.per_strategy_limit = 40;

        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[llm]\nmodel = \"tiny\"\n\n[search.cache]\nttl_seconds = 30\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.llm.model, "tiny");
        assert_eq!(config.llm.max_tokens, LlmConfig::default().max_tokens);
        assert_eq!(config.search.cache.ttl_seconds, 30);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = AppConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn explicit_missing_path_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = AppConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("threadlens"));
    }

    #[test]
    fn env_overrides_fill_secrets() {
        let mut config = AppConfig::default();
        config.apply_overrides_from(|name| match name {
            ENV_CLIENT_ID => Some("id".into()),
            ENV_CLIENT_SECRET => Some("secret".into()),
            ENV_LLM_API_KEY => Some("sk-test".into()),
            _ => None,
        });
        assert_eq!(config.search.client_id.as_deref(), Some("id"));
        assert_eq!(config.search.client_secret.as_deref(), Some("secret"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert!(config.search.has_credentials());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("from-file".into());
        config.apply_overrides_from(|name| (name == ENV_LLM_API_KEY).then(|| "  ".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn invalid_llm_settings_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.llm.max_results_in_prompt = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn half_credentials_rejected() {
        let mut config = AppConfig::default();
        config.search.client_id = Some("id".into());
        assert!(matches!(config.validate(), Err(AppError::Search(_))));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = LlmConfig {
            api_key: Some("sk-very-secret".into()),
            ..LlmConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
