//! Error types for chain event ingestion

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("HTTP request failed: {url}, status: {status:?}, error: {error}")]
    HttpRequest {
        url: String,
        status: Option<u16>,
        error: String,
    },

    #[error("Network timeout after {timeout_secs}s: {context}")]
    NetworkTimeout { timeout_secs: u64, context: String },

    #[error("Network connection error: {0}")]
    NetworkConnection(String),

    #[error("Gateway API error: {endpoint}, status: {status}, message: {message}")]
    GatewayApi {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("JSON parsing error: {context}, error: {error}")]
    JsonParse { context: String, error: String },

    #[error("Malformed lease event: {0}")]
    EventMalformed(String),

    #[error("Event subscription lost: {0}")]
    SubscriptionLost(String),

    #[error("Event subscription failed fatally after {attempts} attempts")]
    SubscriptionFatal { attempts: u32 },
}

impl ChainError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::NetworkTimeout { .. }
            | Self::NetworkConnection(_)
            | Self::HttpRequest { .. } => Level::WARN,
            Self::GatewayApi { .. } | Self::JsonParse { .. } => Level::WARN,
            Self::EventMalformed(_) | Self::SubscriptionLost(_) => Level::WARN,
            Self::SubscriptionFatal { .. } => Level::ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout { .. }
            | Self::NetworkConnection(_)
            | Self::HttpRequest { .. } => true,
            // 5xx server errors are transient and worth retrying;
            // 4xx client errors are permanent and should not be retried.
            Self::GatewayApi { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        let status = err.status().map(|s| s.as_u16());

        if err.is_timeout() {
            Self::NetworkTimeout {
                timeout_secs: 30,
                context: url,
            }
        } else if err.is_connect() {
            Self::NetworkConnection(format!("Failed to connect to {}: {}", url, err))
        } else {
            Self::HttpRequest {
                url,
                status,
                error: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse {
            context: "JSON deserialization".to_string(),
            error: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
