//! Application configuration management.
//!
//! Handles loading and validating dronify configuration including:
//! - HTTP bind address and logging mode
//! - Timezone used to stamp generated record codes
//! - Coefficients of the consumption estimate
//!
//! Values are read from a TOML file and can be overridden through
//! `DRONIFY__<SECTION>__<KEY>` environment variables
//! (e.g. `DRONIFY__SERVER__PORT=8080`).

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimator::ConsumptionModel;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DRONIFY";

static TIMEZONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(UTC|[A-Za-z]+(/[A-Za-z0-9_+\-]+){1,2})$").expect("timezone regex is valid")
});

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} configuration fields are invalid", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DronifyConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// System-wide settings.
    pub system: SystemConfig,

    /// Consumption estimate coefficients.
    pub consumption: ConsumptionModel,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Use production logging (JSON files + compact stdout).
    pub production: bool,

    /// Directory for production log files. Unset means the platform default.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            production: false,
            log_dir: None,
        }
    }
}

/// System-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// IANA timezone whose wall-clock time stamps generated codes.
    pub timezone: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

impl SystemConfig {
    /// Parsed timezone. Falls back to UTC if the name is unknown.
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl DronifyConfig {
    /// Load configuration from `path`, failing if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the file does not exist, or a
    /// load/validation error otherwise.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(Some(path))
    }

    /// Load configuration from `path`, using defaults when the file is missing.
    ///
    /// Environment overrides are applied in both cases.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::build(Some(path))
        } else {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            Self::build(None)
        }
    }

    fn build(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single failing field, or
    /// [`ConfigError::MultipleValidationErrors`] when several fail.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(invalid("server.port", "must be non-zero"));
        }
        if self.server.host.trim().is_empty() {
            errors.push(invalid("server.host", "must not be empty"));
        }
        if self
            .server
            .log_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            errors.push(invalid("server.log_dir", "must not be empty when set"));
        }
        if !is_valid_timezone_format(&self.system.timezone)
            || self.system.timezone.parse::<Tz>().is_err()
        {
            errors.push(invalid(
                "system.timezone",
                &format!("unknown IANA timezone '{}'", self.system.timezone),
            ));
        }

        let model = &self.consumption;
        for (field, value) in [
            ("consumption.base_percent", model.base_percent),
            ("consumption.percent_per_kg", model.percent_per_kg),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(invalid(field, "must be a finite, non-negative number"));
            }
        }
        if !model.vip_factor.is_finite() || model.vip_factor <= 0.0 {
            errors.push(invalid(
                "consumption.vip_factor",
                "must be a finite, positive number",
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Returns `true` if `tz` looks like an IANA timezone name (`UTC`, `Europe/Madrid`).
#[must_use]
pub fn is_valid_timezone_format(tz: &str) -> bool {
    TIMEZONE_RE.is_match(tz)
}

/// Default configuration file location.
///
/// On Linux: `/etc/dronify/config.toml`
/// Elsewhere: the platform config directory (e.g. `~/Library/Application Support/dronify`).
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/dronify/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "dronify").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}
