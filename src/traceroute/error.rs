//! Error types for traceroute operations

use thiserror::Error;

/// Errors that can occur while setting up a trace
///
/// Only setup failures are reported through this type. Timeouts and ICMP
/// errors seen while probing are folded into the hop results instead.
#[derive(Debug, Error)]
pub enum TracerouteError {
    /// Socket creation failed due to insufficient permissions
    ///
    /// This error provides structured information about what permissions
    /// are needed and how to obtain them.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Description of required permissions (e.g., "root or CAP_NET_RAW")
        required: String,
        /// Suggested remedy (e.g., "Run with sudo")
        suggestion: String,
    },

    /// Socket creation or binding failed for other reasons
    #[error("Failed to create socket: {0}")]
    SocketError(String),

    /// DNS resolution failed
    ///
    /// The target hostname could not be resolved to an IP address.
    #[error("Failed to resolve host: {0}")]
    ResolutionError(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Address family selector other than 4 or 6
    #[error("Family must be 4 or 6")]
    InvalidFamily(u8),
}
