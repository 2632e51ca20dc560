//! Reverse DNS lookup functionality

use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;

/// Error type for reverse DNS operations
#[derive(Debug, thiserror::Error)]
pub enum ReverseDnsError {
    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    ResolutionError(String),

    /// No PTR record found
    #[error("No PTR record found")]
    NotFound,
}

/// Perform reverse DNS lookup for an IP address
pub async fn reverse_dns_lookup(
    ip: IpAddr,
    resolver: &TokioResolver,
) -> Result<String, ReverseDnsError> {
    let lookup = resolver
        .reverse_lookup(ip)
        .await
        .map_err(|e| ReverseDnsError::ResolutionError(e.to_string()))?;

    lookup
        .iter()
        .map(|name| strip_root(&name.to_string()).to_string())
        .find(|name| !name.is_empty())
        .ok_or(ReverseDnsError::NotFound)
}

/// Drop the trailing root label dot of a fully qualified name
pub fn strip_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Create a resolver querying the name servers of `config`
pub fn create_resolver(config: ResolverConfig) -> TokioResolver {
    TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build()
}
