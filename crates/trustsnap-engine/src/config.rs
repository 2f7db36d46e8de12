//! Runtime configuration.
//!
//! Two sources, lowest precedence first:
//! 1. an optional `trustsnap.toml`
//! 2. the `TRUSTSNAP_EXPECTED_UI_VERSION` environment variable
//!
//! Command-line flags are applied on top by the CLI.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use trustsnap_core::errors::{ExError, ExErrorKind};
use trustsnap_core::version::Version;
use trustsnap_store::Result;

/// Environment variable naming the trust version the built UI expects.
pub const EXPECTED_UI_VERSION_ENV: &str = "TRUSTSNAP_EXPECTED_UI_VERSION";

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "trustsnap.toml";

/// Inputs to the deploy gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    pub expected_ui_version: Option<Version>,
}

impl GateConfig {
    pub fn new(expected_ui_version: Option<Version>) -> Self {
        Self {
            expected_ui_version,
        }
    }

    /// Read the expected UI version from the environment.
    ///
    /// Missing or unparsable values yield `None`; the gate then passes its
    /// version check with a warning.
    pub fn from_env() -> Self {
        Self::new(parse_expected_version(
            std::env::var(EXPECTED_UI_VERSION_ENV).ok().as_deref(),
        ))
    }
}

/// Interpret a raw expected-version value. Blank means unset.
pub fn parse_expected_version(raw: Option<&str>) -> Option<Version> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse() {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::warn!(
                value = raw,
                error = %e,
                "Ignoring unparsable {}", EXPECTED_UI_VERSION_ENV
            );
            None
        }
    }
}

/// Contents of `trustsnap.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustConfig {
    pub db_path: Option<PathBuf>,
    pub log_profile: Option<String>,
    pub expected_ui_version: Option<Version>,
}

impl TrustConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `Configuration` if the text is not valid TOML or has unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            ExError::new(ExErrorKind::Configuration)
                .with_op("config_parse")
                .with_message(e.to_string())
        })
    }

    /// Load a configuration file that must exist.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Configuration` if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("config_load")
                .with_message(format!("{}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load a configuration file if it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// As [`TrustConfig::load`] when the file exists.
    pub fn load_optional(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Gate inputs from this file, with the environment taking precedence.
    pub fn gate_config(&self) -> GateConfig {
        let from_env = GateConfig::from_env();
        GateConfig::new(from_env.expected_ui_version.or(self.expected_ui_version))
    }
}
