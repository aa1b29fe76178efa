use thiserror::Error;

/// Unified application error.
///
/// Every layer (config, fetch, normalization) fails through this type so the
/// polling scheduler can turn any failure into a widget error message.
/// It is `Clone` because a single failed in-flight request is handed to every
/// caller that joined it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API failed: {status} {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported API provider: {0:?}")]
    UnsupportedProvider(String),

    #[error("Unsupported endpoint for API provider {0}")]
    UnsupportedEndpoint(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Transient failures are worth another attempt; structural ones are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http { .. } | Self::Parse(_))
    }
}
