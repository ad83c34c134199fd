//! Configuration management for swap progress tracking
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::steps::{canonical_swap_template, merge, IdentityKind, StepDescriptor, StepIdentity};
use crate::tracker::SignaturePolicy;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "SWAP_PROGRESS_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tracker: TrackerConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub signature_policy: SignaturePolicy,
    pub identity: IdentityKind,
    /// Single character joining keys in a plan signature; backslash is reserved
    pub signature_separator: char,
    pub channel_capacity: usize,
    /// Overrides the canonical swap template when present
    pub template: Option<Vec<StepDescriptor>>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            signature_policy: SignaturePolicy::default(),
            identity: IdentityKind::default(),
            signature_separator: merge::DEFAULT_SIGNATURE_SEPARATOR,
            channel_capacity: 1024,
            template: None,
        }
    }
}

impl TrackerConfig {
    /// Expected-phase template, falling back to the canonical swap
    pub fn template(&self) -> Vec<StepDescriptor> {
        self.template
            .clone()
            .unwrap_or_else(canonical_swap_template)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Read newline-delimited JSON events from stdin
    pub stdin: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.tracker.signature_separator == merge::SIGNATURE_ESCAPE {
            anyhow::bail!(
                "tracker.signature_separator cannot be {:?}, it escapes separators inside keys",
                merge::SIGNATURE_ESCAPE
            );
        }
        if self.tracker.channel_capacity == 0 {
            anyhow::bail!("tracker.channel_capacity must be greater than zero");
        }
        if self.api.enabled && self.api.port == 0 {
            anyhow::bail!("api.port must be set when the API is enabled");
        }
        if self.metrics.enabled && self.metrics.port == 0 {
            anyhow::bail!("metrics.port must be set when metrics are enabled");
        }
        if self.api.enabled && self.metrics.enabled && self.api.port == self.metrics.port {
            anyhow::bail!("api.port and metrics.port must differ");
        }

        if let Some(template) = &self.tracker.template {
            let identity = self.tracker.identity.build();
            for (index, step) in template.iter().enumerate() {
                identity
                    .key(step)
                    .with_context(|| format!("Invalid tracker.template entry {}", index))?;
            }
            if template.is_empty() {
                tracing::warn!("tracker.template is empty - progress starts with no steps");
            }
        }

        Ok(())
    }
}

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
