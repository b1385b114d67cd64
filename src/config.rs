//! Configuration for the two model endpoints.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{NerCompareError, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Connection settings for one chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Base URL of the server (e.g., "http://localhost:8001")
    pub api_base: String,

    /// Model identifier sent in the request body
    pub model: String,

    /// Bearer token, empty when the server is unauthenticated
    pub api_key: String,
}

impl EndpointConfig {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            model: model.into(),
            api_key: String::new(),
        }
    }
}

/// Sampling parameters shared by both endpoints.
///
/// Both models must see identical generation settings, otherwise the
/// comparison measures the sampler rather than the adapter.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub min_p: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 20,
            min_p: 0.0,
            max_tokens: 6144,
            presence_penalty: 1.5,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The unmodified base model
    pub base: EndpointConfig,

    /// The base model with the fine-tuned NER adapter
    pub lora: EndpointConfig,

    /// Sampling parameters
    pub generation: GenerationConfig,

    /// Per-request timeout, enforced by the HTTP client
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: EndpointConfig::new("http://localhost:8001", "qwen3-base"),
            lora: EndpointConfig::new("http://localhost:8002", "qwen3-ner-zero3"),
            generation: GenerationConfig::default(),
            timeout_secs: 120,
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    base: Option<EndpointFileSection>,
    lora: Option<EndpointFileSection>,
    generation: Option<GenerationFileSection>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EndpointFileSection {
    api_base: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationFileSection {
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
    min_p: Option<f32>,
    max_tokens: Option<u32>,
    presence_penalty: Option<f32>,
}

impl EndpointFileSection {
    fn merge_into(self, endpoint: &mut EndpointConfig) {
        if let Some(api_base) = self.api_base {
            endpoint.api_base = api_base;
        }
        if let Some(model) = self.model {
            endpoint.model = model;
        }
        if let Some(api_key) = self.api_key {
            endpoint.api_key = api_key;
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (BASE_API_URL, LORA_API_URL, BASE_MODEL, ...)
    /// 2. Config file (~/.config/ner-compare/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|key| env::var(key).ok());

        Ok(config)
    }

    /// Override values from an environment-like lookup.
    ///
    /// Unparseable numeric values are ignored and the previous value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BASE_API_URL") {
            self.base.api_base = url;
        }
        if let Some(url) = lookup("LORA_API_URL") {
            self.lora.api_base = url;
        }
        if let Some(model) = lookup("BASE_MODEL") {
            self.base.model = model;
        }
        if let Some(model) = lookup("LORA_MODEL") {
            self.lora.model = model;
        }
        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.base.api_key = api_key.clone();
            self.lora.api_key = api_key;
        }

        if let Some(Ok(secs)) = lookup("NER_REQUEST_TIMEOUT_SECS").map(|v| v.parse()) {
            self.timeout_secs = secs;
        }
        if let Some(Ok(temp)) = lookup("NER_TEMPERATURE").map(|v| v.parse()) {
            self.generation.temperature = temp;
        }
        if let Some(Ok(tokens)) = lookup("NER_MAX_TOKENS").map(|v| v.parse()) {
            self.generation.max_tokens = tokens;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NerCompareError::io(path, e))?;

        let file_config: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| NerCompareError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(base) = file_config.base {
            base.merge_into(&mut config.base);
        }
        if let Some(lora) = file_config.lora {
            lora.merge_into(&mut config.lora);
        }
        if let Some(generation) = file_config.generation {
            let g = &mut config.generation;
            if let Some(temperature) = generation.temperature {
                g.temperature = temperature;
            }
            if let Some(top_p) = generation.top_p {
                g.top_p = top_p;
            }
            if let Some(top_k) = generation.top_k {
                g.top_k = top_k;
            }
            if let Some(min_p) = generation.min_p {
                g.min_p = min_p;
            }
            if let Some(max_tokens) = generation.max_tokens {
                g.max_tokens = max_tokens;
            }
            if let Some(presence_penalty) = generation.presence_penalty {
                g.presence_penalty = presence_penalty;
            }
        }
        if let Some(secs) = file_config.timeout_secs {
            config.timeout_secs = secs;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ner-compare")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        for (label, endpoint) in [("base", &self.base), ("lora", &self.lora)] {
            if endpoint.api_base.is_empty() {
                return Err(NerCompareError::InvalidConfig(format!(
                    "{} endpoint URL is required. Set {}_API_URL or add it to the config file.",
                    label,
                    label.to_uppercase()
                )));
            }
            if endpoint.model.is_empty() {
                return Err(NerCompareError::InvalidConfig(format!(
                    "{} model name is required. Set {}_MODEL or add it to the config file.",
                    label,
                    label.to_uppercase()
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(NerCompareError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
