//! Error types shared across the bootstrap crate.
//!
//! The taxonomy mirrors how failures are handled by the orchestrator:
//! transport and sequence errors are fatal for the current appliance (the
//! run proceeds to the next inventory entry), validation errors are raised
//! before any network call is made, and config/inventory errors abort the
//! run before orchestration starts.

/// Result alias used throughout the crate.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// The appliance could not be reached, or the request could not be
    /// completed at the transport level.
    #[error("transport error: {0}")]
    Transport(String),

    /// The appliance answered with a non-success status.
    #[error("appliance rejected {command}: HTTP {status}")]
    Api { command: String, status: u16 },

    /// A protocol step was invoked out of order, or a correlation token
    /// was missing or expired.
    #[error("sequence error: {0}")]
    Sequence(String),

    /// Malformed inventory data, detected before any network call.
    #[error("validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    /// Configuration could not be loaded or did not validate.
    #[error("config error: {0}")]
    Config(String),

    /// The inventory file could not be loaded or deserialized.
    #[error("inventory error: {0}")]
    Inventory(String),

    /// A required run secret could not be resolved.
    #[error("secret resolution failed: {0}")]
    Secret(String),
}

impl BootstrapError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BootstrapError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True if the failure happened before any request was issued.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            BootstrapError::Validation { .. }
                | BootstrapError::Config(_)
                | BootstrapError::Inventory(_)
        )
    }
}

impl From<reqwest::Error> for BootstrapError {
    fn from(err: reqwest::Error) -> Self {
        BootstrapError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_names_field() {
        let err = BootstrapError::validation("cidr_address", "missing '/' separator");
        let msg = err.to_string();
        assert!(msg.contains("cidr_address"));
        assert!(msg.contains("missing '/'"));
    }

    #[test]
    fn preflight_classification() {
        assert!(BootstrapError::validation("x", "y").is_preflight());
        assert!(BootstrapError::Inventory("bad file".into()).is_preflight());
        assert!(!BootstrapError::Transport("refused".into()).is_preflight());
        assert!(!BootstrapError::Sequence("no token".into()).is_preflight());
    }
}
