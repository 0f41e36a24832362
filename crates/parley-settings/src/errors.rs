//! Settings error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The settings file is not valid JSON.
    #[error("{} is not valid JSON: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The merged document does not fit the settings schema
    /// (e.g. `"queueCapacity": "lots"`).
    #[error("settings have the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// A value parsed but cannot be used.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// camelCase path of the offending field, e.g. `server.queueCapacity`.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl SettingsError {
    /// The field named by an [`InvalidValue`](Self::InvalidValue) error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_names_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/parley/settings.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/parley/settings.json"), "{msg}");
        assert!(msg.contains("denied"), "{msg}");
    }

    #[test]
    fn parse_error_names_file() {
        let source = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("settings.json"),
            source,
        };
        assert!(err.to_string().starts_with("settings.json is not valid JSON"));
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue {
            field: "server.queueCapacity",
            reason: "must be greater than zero",
        };
        assert_eq!(
            err.to_string(),
            "invalid server.queueCapacity: must be greater than zero"
        );
        assert_eq!(err.field(), Some("server.queueCapacity"));
    }

    #[test]
    fn shape_error_from_conversion() {
        let json_err = serde_json::from_str::<u16>("\"lots\"").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(matches!(err, SettingsError::Shape(_)));
        assert_eq!(err.field(), None);
    }
}
