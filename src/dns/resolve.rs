//! Forward resolution of trace targets

use crate::socket::IpVersion;
use crate::traceroute::TracerouteError;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;

/// Capability to turn a host name into addresses
///
/// Called once per trace, before any probe is sent, and only for targets that
/// are not literal addresses.
pub trait NameResolver {
    /// Resolve `host`, optionally restricted to one address family
    fn resolve(&self, host: &str, family: Option<IpVersion>)
        -> Result<Vec<IpAddr>, TracerouteError>;
}

/// Resolve `host` with A records, AAAA records, or both
pub async fn resolve_host(
    resolver: &TokioResolver,
    host: &str,
    family: Option<IpVersion>,
) -> Result<Vec<IpAddr>, TracerouteError> {
    let failed = |e: hickory_resolver::ResolveError| {
        TracerouteError::ResolutionError(format!("{host}: {e}"))
    };

    let addresses: Vec<IpAddr> = match family {
        Some(IpVersion::V4) => resolver
            .ipv4_lookup(host)
            .await
            .map_err(failed)?
            .iter()
            .map(|a| IpAddr::V4(a.0))
            .collect(),
        Some(IpVersion::V6) => resolver
            .ipv6_lookup(host)
            .await
            .map_err(failed)?
            .iter()
            .map(|aaaa| IpAddr::V6(aaaa.0))
            .collect(),
        None => resolver.lookup_ip(host).await.map_err(failed)?.iter().collect(),
    };

    if addresses.is_empty() {
        return Err(TracerouteError::ResolutionError(format!(
            "No addresses found for {host}"
        )));
    }
    Ok(addresses)
}
