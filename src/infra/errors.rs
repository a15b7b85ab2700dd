// src/infra/errors.rs - Error types for geoexplorer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    // Backend errors
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("No {backend} backend configured. {hint}")]
    NoProvider { backend: String, hint: String },

    // Conversation files
    #[error("Invalid conversation filename '{0}': use a plain file name without directories")]
    InvalidFilename(String),

    #[error("Conversation file error: {0}")]
    Conversation(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GeoError::Provider {
                retriable: true,
                ..
            } | GeoError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let e = GeoError::Provider {
            provider: "ollama".into(),
            message: "connection refused".into(),
            retriable: true,
        };
        assert_eq!(
            e.to_string(),
            "Provider 'ollama' error: connection refused"
        );
        assert!(e.is_retriable());
    }

    #[test]
    fn test_rate_limited_is_retriable() {
        let e = GeoError::RateLimited {
            provider: "openai".into(),
            retry_after_ms: 5000,
        };
        assert!(e.is_retriable());
    }

    #[test]
    fn test_invalid_filename_not_retriable() {
        let e = GeoError::InvalidFilename("../etc/passwd".into());
        assert!(!e.is_retriable());
        assert!(e.to_string().contains("../etc/passwd"));
    }
}
