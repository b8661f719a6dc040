//! Error types for the shelter cache.
//!
//! Most failures in this crate degrade to "missing data" and are only logged.
//! The variants below are the ones that cross a function boundary.

use thiserror::Error;

/// Errors produced by the shelter cache and its persistence layer.
#[derive(Debug, Error)]
pub enum ShelterError {
    /// A single shelter entry could not be interpreted (e.g. not a JSON object).
    #[error("Invalid shelter payload: {0}")]
    InvalidShelter(String),

    /// A fingerprint could not be derived from the payload.
    #[error("Fingerprint error: {0}")]
    Fingerprint(String),

    /// A chat response did not carry a card list.
    #[error("Invalid chat response: {0}")]
    InvalidResponse(String),

    /// A session was bound to a result set that does not exist.
    #[error("Unknown result set: {0}")]
    UnknownResultSet(String),

    /// The persistence adapter failed to load or save a blob.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ShelterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = ShelterError::UnknownResultSet("01HX".into());
        assert_eq!(err.to_string(), "Unknown result set: 01HX");
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ShelterError = parse.unwrap_err().into();
        assert!(matches!(err, ShelterError::Serialization(_)));
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ShelterError = io.into();
        assert!(err.to_string().contains("denied"));
    }
}
