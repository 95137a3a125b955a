use thiserror::Error;

/// Errors from talking to a controller
///
/// Covers establishing the WebSocket session, framing and decoding of
/// controller messages, and requests the controller refused or never
/// answered.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The WebSocket session could not be established
    ///
    /// Raised by `connect` when the TCP connection or the WebSocket upgrade
    /// fails (refused, unreachable, bad handshake).
    #[error("Connect error: {0}")]
    ConnectError(String),

    /// Network communication error on an established session
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A frame could not be serialized or decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The controller answered with a non-success response code
    #[error("Request rejected with code {code}: {description}")]
    Rejected { code: String, description: String },

    /// No response arrived within the request timeout
    #[error("Request timed out")]
    Timeout,

    /// The session ended before the response arrived
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::ParseError(error.to_string())
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let error = ApiError::Rejected {
            code: "400".to_string(),
            description: "Invalid objnam".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Request rejected with code 400: Invalid objnam"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: ApiError = json_error.into();
        assert!(matches!(error, ApiError::ParseError(_)));
    }
}
