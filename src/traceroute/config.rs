//! Configuration types for traceroute operations

use crate::socket::IpVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Configuration for one trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Target hostname or IP address
    pub target: String,
    /// Number of probes per hop (default: 1)
    pub count: u16,
    /// Pause after a timed out or TTL exceeded probe (default: 0)
    pub interval: Duration,
    /// Timeout for individual probes (default: 25s)
    pub timeout: Duration,
    /// Starting TTL value (default: 1)
    pub initial_ttl: u8,
    /// Maximum number of hops (default: 30)
    pub max_hops: u8,
    /// Address family used to resolve host names (default: any)
    ///
    /// A literal target address always keeps its own family.
    pub family: Option<IpVersion>,
    /// Echo identifier; a random one is drawn per scan when unset
    pub identifier: Option<u16>,
    /// Local address to bind the probe socket to
    pub source: Option<IpAddr>,
    /// Include the AS name in ASN output (default: false)
    pub detailed_asn: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            count: 1,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(25),
            initial_ttl: 1,
            max_hops: 30,
            family: None,
            identifier: None,
            source: None,
            detailed_asn: false,
        }
    }
}

/// Non-fatal adjustment made while normalizing a configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Detailed ASN lookups were requested together with IPv6 and turned off
    DetailedAsnUnsupportedForIpv6,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DetailedAsnUnsupportedForIpv6 => write!(
                f,
                "Detailed ASN lookup is not supported for IPv6, continuing without it"
            ),
        }
    }
}

impl TraceConfig {
    /// Create a new TraceConfig builder
    pub fn builder() -> TraceConfigBuilder {
        TraceConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target.is_empty() {
            return Err("Target must be specified".to_string());
        }
        if self.count < 1 {
            return Err("count must be at least 1".to_string());
        }
        if self.initial_ttl < 1 {
            return Err("initial_ttl must be at least 1".to_string());
        }
        if self.max_hops < self.initial_ttl {
            return Err("max_hops must be greater than or equal to initial_ttl".to_string());
        }
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Resolve option combinations that cannot be honored
    ///
    /// Every adjustment is reported back so the caller can surface it.
    pub fn normalize(mut self) -> (TraceConfig, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();
        if self.detailed_asn && self.family == Some(IpVersion::V6) {
            self.detailed_asn = false;
            warnings.push(ConfigWarning::DetailedAsnUnsupportedForIpv6);
        }
        (self, warnings)
    }
}

/// Builder for TraceConfig
pub struct TraceConfigBuilder {
    config: TraceConfig,
}

impl TraceConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: TraceConfig::default(),
        }
    }

    /// Set the target hostname or IP address
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.config.target = target.into();
        self
    }

    /// Set the number of probes per hop
    pub fn count(mut self, count: u16) -> Self {
        self.config.count = count;
        self
    }

    /// Set the inter-probe interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the per-probe timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the starting TTL value
    pub fn initial_ttl(mut self, ttl: u8) -> Self {
        self.config.initial_ttl = ttl;
        self
    }

    /// Set the maximum number of hops
    pub fn max_hops(mut self, hops: u8) -> Self {
        self.config.max_hops = hops;
        self
    }

    /// Restrict host name resolution to one address family
    pub fn family(mut self, family: IpVersion) -> Self {
        self.config.family = Some(family);
        self
    }

    /// Pin the echo identifier
    pub fn identifier(mut self, identifier: u16) -> Self {
        self.config.identifier = Some(identifier);
        self
    }

    /// Bind probes to a local source address
    pub fn source(mut self, source: IpAddr) -> Self {
        self.config.source = Some(source);
        self
    }

    /// Enable or disable detailed ASN output
    pub fn detailed_asn(mut self, detailed: bool) -> Self {
        self.config.detailed_asn = detailed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TraceConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TraceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
