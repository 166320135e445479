//! Upstream provider error types.

/// Failure to fetch departures from an upstream provider.
///
/// Always distinguishable from an empty successful result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider answered with a non-success status
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Provider rejected the request as too frequent
    #[error("rate limited by {provider} (429)")]
    RateLimited { provider: String },

    /// Request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// Response could not be understood
    #[error("failed to parse provider response: {0}")]
    Parse(String),

    /// No data source knows this station
    #[error("no departures available for station {0}")]
    StationNotFound(String),

    /// Request was abandoned before completing
    #[error("request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// HTTP status code behind this error, if there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::Timeout => Some(504),
            _ => None,
        }
    }

    /// Short human-readable cause for logs.
    pub fn reason(&self) -> String {
        match self.status_code() {
            Some(429) => "Rate limit exceeded".to_string(),
            Some(502) => "Bad gateway (server error)".to_string(),
            Some(503) => "Service unavailable".to_string(),
            Some(504) => "Gateway timeout".to_string(),
            Some(status) => format!("HTTP {status}"),
            None => "Unknown error".to_string(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(429)
    }
}
