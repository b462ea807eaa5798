//! Settings file format for `formtrans`.
//!
//! Loaded once at startup from `--config`, or from `formtrans.toml` in the
//! working directory when present. Every key is optional.
//!
//! # Example
//!
//! ```toml
//! [model]
//! provider = "openai"          # or "anthropic", or "offline" for dry runs
//! model = "gpt-3.5-turbo"
//! max_tokens = 500
//! temperature = 0.2
//! timeout_secs = 30
//!
//! [registry]
//! path = "forms.json"
//!
//! [history]
//! path = "history.jsonl"
//!
//! [engine]
//! preamble = "You are a careful medical records clerk."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use formtrans_engine::{EngineConfig, ModelConfig, Provider, DEFAULT_MODEL, DEFAULT_TIMEOUT};

/// Settings file looked up in the working directory when `--config` is absent.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "formtrans.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    pub model: ModelSection,
    pub registry: RegistrySection,
    pub history: HistorySection,
    pub engine: EngineSection,
}

/// `[model]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ModelSection {
    pub provider: Provider,
    pub model: String,
    /// Falls back to the provider's environment variable when absent.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RegistrySection {
    pub path: PathBuf,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("forms.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HistorySection {
    pub path: PathBuf,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("history.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct EngineSection {
    pub preamble: Option<String>,
}

impl Settings {
    /// Read settings from `path`, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists, or fall back to defaults.
    ///
    /// Relative registry and history paths resolve against the settings
    /// file's directory.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
        let mut settings: Settings = toml::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            settings.registry.path = rebase(base, &settings.registry.path);
            settings.history.path = rebase(base, &settings.history.path);
        }
        Ok(settings)
    }

    pub(crate) fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model: self.model.model.clone(),
            timeout: Duration::from_secs(self.model.timeout_secs),
            preamble: self.engine.preamble.clone(),
        }
    }

    /// Build the model connection settings. The API key comes from the
    /// settings file or, failing that, the provider's environment variable.
    /// The offline provider needs none.
    pub(crate) fn model_config(&self) -> Result<ModelConfig, String> {
        let provider = self.model.provider;
        let api_key = match (&self.model.api_key, provider.api_key_var()) {
            (Some(key), _) if !key.trim().is_empty() => key.clone(),
            (_, None) => String::new(),
            (_, Some(var)) => std::env::var(var)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    format!("no API key: set [model] api_key in the settings file or {}", var)
                })?,
        };
        let mut config = ModelConfig::new(provider, api_key);
        config.base_url = self.model.base_url.clone();
        config.max_tokens = self.model.max_tokens;
        config.temperature = self.model.temperature;
        config.timeout = Duration::from_secs(self.model.timeout_secs);
        Ok(config)
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
