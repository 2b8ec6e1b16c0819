//! Scan configuration file for trackscan.
//!
//! A config file is optional. Command-line flags are layered on top with
//! [`Config::apply`]: lists extend, scalars override.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::{CustomSignature, Provider, ScanOptions};
use crate::error::SignatureError;

/// File names searched for in the scan root.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["trackscan.yaml", ".trackscan.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Provider names to detect. Empty means all built-in providers.
    #[serde(default)]
    pub providers: Vec<String>,
    #[serde(default)]
    pub custom_functions: Vec<SignatureSpec>,
    /// Glob patterns for paths to skip.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub max_file_size: Option<u64>,
    #[serde(default)]
    pub file_timeout_ms: Option<u64>,
    #[serde(default)]
    pub scan_timeout_ms: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

/// A custom function, either as text (`track(EVENT_NAME, PROPERTIES)`) or
/// as an explicit argument layout.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SignatureSpec {
    Text(String),
    Structured(CustomSignature),
}

impl SignatureSpec {
    pub fn resolve(&self) -> Result<CustomSignature, SignatureError> {
        match self {
            SignatureSpec::Text(text) => CustomSignature::parse(text),
            SignatureSpec::Structured(signature) => Ok(signature.clone()),
        }
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        // An empty file is a valid, empty config.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Find a config file in `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Layer `overrides` on top of this config.
    pub fn apply(&mut self, overrides: Config) {
        self.providers.extend(overrides.providers);
        self.custom_functions.extend(overrides.custom_functions);
        self.ignore.extend(overrides.ignore);
        self.max_file_size = overrides.max_file_size.or(self.max_file_size);
        self.file_timeout_ms = overrides.file_timeout_ms.or(self.file_timeout_ms);
        self.scan_timeout_ms = overrides.scan_timeout_ms.or(self.scan_timeout_ms);
        self.concurrency = overrides.concurrency.or(self.concurrency);
    }

    /// Resolved provider list; unknown names are an error.
    pub fn providers(&self) -> anyhow::Result<Vec<Provider>> {
        if self.providers.is_empty() {
            return Ok(Provider::BUILTIN.to_vec());
        }
        let mut providers = Vec::new();
        for name in &self.providers {
            let provider: Provider = name.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        Ok(providers)
    }

    pub fn custom_functions(&self) -> anyhow::Result<Vec<CustomSignature>> {
        let mut signatures = Vec::with_capacity(self.custom_functions.len());
        for spec in &self.custom_functions {
            signatures.push(spec.resolve()?);
        }
        Ok(signatures)
    }

    /// Build scan options, applying defaults for anything unset.
    pub fn to_options(&self) -> anyhow::Result<ScanOptions> {
        let defaults = ScanOptions::default();
        Ok(ScanOptions {
            providers: self.providers()?,
            custom_functions: self.custom_functions()?,
            ignore: self.ignore.clone(),
            max_file_size: self.max_file_size.unwrap_or(defaults.max_file_size),
            file_timeout: match self.file_timeout_ms {
                // Zero disables the per-file bound.
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.file_timeout,
            },
            scan_timeout: self.scan_timeout_ms.map(Duration::from_millis),
            concurrency: self.concurrency.filter(|n| *n > 0),
            ..defaults
        })
    }
}

/// Validate a config before a scan.
///
/// Unknown providers and malformed signatures are fatal. An ignore pattern
/// that does not compile is only logged: the scan skips it and reports it
/// as an issue.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    config.providers()?;
    config.custom_functions()?;

    for pattern in &config.ignore {
        if let Err(e) = globset::Glob::new(pattern) {
            warn!(pattern = %pattern, error = %e, "skipping invalid ignore pattern");
        }
    }

    Ok(())
}
