//! Error types for rollkeeper.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Tabular-store errors.
///
/// `RateLimited`, `Unavailable` and `Request` form the transient class and
/// are eligible for retry with backoff; everything else raises immediately.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store rate limited")]
    RateLimited,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("store API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected sheet layout: {0}")]
    Schema(String),
}

impl StoreError {
    /// Whether the retry layer should back off and try again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::RateLimited | StoreError::Unavailable(_) | StoreError::Request(_)
        )
    }
}

/// Social-network client errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::RateLimited.is_transient());
        assert!(StoreError::Unavailable("503".into()).is_transient());
        assert!(StoreError::Request("connection reset".into()).is_transient());
        assert!(
            !StoreError::Api {
                status: 404,
                body: "not found".into()
            }
            .is_transient()
        );
        assert!(!StoreError::Schema("missing column".into()).is_transient());
    }
}
