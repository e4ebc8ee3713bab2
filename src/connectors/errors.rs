use std::fmt;

/// Errors that can occur while talking to the external store API
#[derive(Debug)]
pub enum ConnectorError {
    /// Endpoint answered with a non-success status
    HttpStatus { url: String, status: u16 },
    /// Service unreachable, timed out, or the body could not be read
    ServiceUnavailable(String),
    /// Response body did not match the expected shape
    InvalidResponse(String),
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus { url, status } => {
                write!(f, "Fetch failed for {}: {}", url, status)
            }
            Self::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            Self::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::ServiceUnavailable(format!("Request timeout: {}", err))
        } else if err.is_connect() {
            Self::ServiceUnavailable(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::ServiceUnavailable(err.to_string())
        }
    }
}
