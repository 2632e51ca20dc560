//! Core traceroute functionality and utilities

pub mod api;
pub mod config;
pub mod error;
pub mod prober;
pub mod scanner;
pub mod types;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use api::{resolve_target, start_trace, start_trace_with_socket};
pub use config::{ConfigWarning, TraceConfig, TraceConfigBuilder};
pub use error::TracerouteError;
pub use prober::Prober;
pub use scanner::{HopScanner, ScanSession};
pub use types::HopResult;

/// Draw a fresh random echo identifier for a scan
pub fn unique_identifier() -> u16 {
    rand::random::<u16>()
}

/// Represents ASN information for an IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnInfo {
    /// Autonomous System Number (e.g., 13335); 0 for special-use space
    pub asn: u32,
    /// IP prefix/CIDR block (e.g., "104.16.0.0/12")
    pub prefix: String,
    /// Two-letter country code (e.g., "US")
    pub country_code: String,
    /// Regional Internet Registry (e.g., "ARIN")
    pub registry: String,
    /// AS name/organization (e.g., "CLOUDFLARENET")
    pub name: String,
}

impl AsnInfo {
    /// Whether this is a routable, publicly announced AS
    pub fn is_public(&self) -> bool {
        self.asn != 0
    }
}
