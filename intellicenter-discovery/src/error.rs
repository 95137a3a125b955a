//! Error types for the discovery system.

use thiserror::Error;

/// Error type for discovery operations.
///
/// Represents the failure modes of searching the local network for a controller:
/// daemon problems and bad search settings.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Network-related errors (starting the mDNS daemon, browsing, receiving)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The search would be repeated without any pause
    #[error("Retry interval must be at least one second")]
    InvalidRetryInterval,

    /// The multicast interface hint is not an IPv4 address
    #[error("Invalid multicast interface: {0}")]
    InvalidInterface(String),
}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DiscoveryError::NetworkError("address in use".to_string());
        assert_eq!(error.to_string(), "Network error: address in use");

        let error = DiscoveryError::InvalidInterface("eth0".to_string());
        assert_eq!(error.to_string(), "Invalid multicast interface: eth0");

        assert_eq!(
            DiscoveryError::InvalidRetryInterval.to_string(),
            "Retry interval must be at least one second"
        );
    }
}
