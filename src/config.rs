//! Configuration system for lmboot.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `lmboot.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `LMBOOT_API_PORT` - Management API port used when an appliance does not
//!   specify one
//! - `LMBOOT_API_TIMEOUT_SECS` - Per-request timeout
//! - `LMBOOT_API_VERIFY_TLS` - Verify appliance certificates (appliances ship
//!   self-signed certificates, so this defaults to false)
//! - `LMBOOT_PARAMETER_FAILURE` - Per-parameter failure policy: "abort" or
//!   "continue"
//! - `LMBOOT_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{BootstrapError, BootstrapResult};
use crate::params::ParameterFailurePolicy;

/// Global configuration singleton.
static CONFIG: OnceLock<BootConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Management API client configuration
    pub api: ApiConfig,
    /// Orchestration policy configuration
    pub policy: PolicyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Management API client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Default management port for appliances that do not specify one
    pub port: u16,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Verify appliance TLS certificates
    pub verify_tls: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 443,
            timeout_secs: 30,
            verify_tls: false,
        }
    }
}

/// Orchestration policy configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// What to do when a single parameter fails to apply
    pub parameter_failure: ParameterFailurePolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            parameter_failure: ParameterFailurePolicy::Abort,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BootConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `lmboot.toml` file (optional)
    /// 3. Environment variables
    fn load() -> BootstrapResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("api.port", 443)
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_default("api.timeout_secs", 30)
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_default("api.verify_tls", false)
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_default("policy.parameter_failure", "abort")
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            // Load from lmboot.toml (optional)
            .add_source(config::File::with_name("lmboot").required(false))
            // Override with environment variables
            .set_override_option(
                "api.port",
                env::var("LMBOOT_API_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_override_option(
                "api.timeout_secs",
                env::var("LMBOOT_API_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_override_option(
                "api.verify_tls",
                env::var("LMBOOT_API_VERIFY_TLS")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_override_option(
                "policy.parameter_failure",
                env::var("LMBOOT_PARAMETER_FAILURE").ok(),
            )
            .map_err(|e| BootstrapError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("LMBOOT_LOG_LEVEL").ok())
            .map_err(|e| BootstrapError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| BootstrapError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| BootstrapError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> BootstrapResult<()> {
        if self.api.port == 0 {
            return Err(BootstrapError::Config(
                "api.port must be greater than 0".to_string(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(BootstrapError::Config(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(BootstrapError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> BootstrapResult<&'static BootConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = BootConfig::load()?;
    config.validate()?;

    // Try to set it (ignore if another thread beat us)
    let _ = CONFIG.set(config.clone());

    Ok(CONFIG.get().expect("config was just set"))
}

/// Initialize configuration explicitly.
///
/// Call this early in the binary to catch configuration errors.
pub fn init_config() -> BootstrapResult<&'static BootConfig> {
    get_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_are_sane() {
        let config = BootConfig::default();
        assert_eq!(config.api.port, 443);
        assert_eq!(config.api.timeout_secs, 30);
        assert!(!config.api.verify_tls);
        assert_eq!(
            config.policy.parameter_failure,
            ParameterFailurePolicy::Abort
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        env::set_var("LMBOOT_API_PORT", "8443");
        env::set_var("LMBOOT_PARAMETER_FAILURE", "continue");

        let config = BootConfig::load().expect("load failed");
        assert_eq!(config.api.port, 8443);
        assert_eq!(
            config.policy.parameter_failure,
            ParameterFailurePolicy::Continue
        );

        env::remove_var("LMBOOT_API_PORT");
        env::remove_var("LMBOOT_PARAMETER_FAILURE");
    }

    #[test]
    #[serial]
    fn zero_port_rejected() {
        let mut config = BootConfig::default();
        config.api.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn bad_log_level_rejected() {
        let mut config = BootConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
