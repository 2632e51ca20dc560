//! High-level trace setup
//!
//! Everything that can fail before the first probe happens here: the
//! configuration is checked, the target resolved, the family chosen and the
//! transport opened. Once [`start_trace`] returns, the scan itself can no
//! longer fail.

use crate::dns::NameResolver;
use crate::socket::factory::{open_transport, Transport};
use crate::socket::{IpVersion, ProbeSocket};
use crate::traceroute::{unique_identifier, HopScanner, TraceConfig, TracerouteError};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::{debug, info};

/// Resolve the configured target to the address that will be probed
///
/// A target containing a colon is an IPv6 literal and must parse as one.
/// Other literal addresses are used as is. Host names go through `resolver`,
/// restricted to the configured family, and the first address wins.
pub fn resolve_target(
    config: &TraceConfig,
    resolver: &impl NameResolver,
) -> Result<IpAddr, TracerouteError> {
    if IpVersion::from_address_str(&config.target) == IpVersion::V6 {
        return config
            .target
            .parse::<Ipv6Addr>()
            .map(IpAddr::V6)
            .map_err(|_| {
                TracerouteError::ResolutionError(format!(
                    "Invalid IPv6 address: {}",
                    config.target
                ))
            });
    }
    if let Ok(ip) = config.target.parse::<Ipv4Addr>() {
        return Ok(IpAddr::V4(ip));
    }

    let addresses = resolver.resolve(&config.target, config.family)?;
    debug!(target = %config.target, ?addresses, "resolved target");
    addresses.into_iter().next().ok_or_else(|| {
        TracerouteError::ResolutionError(format!("No addresses found for {}", config.target))
    })
}

/// Start a trace over a caller supplied transport
///
/// The transport must speak the family of `target`.
pub fn start_trace_with_socket<S: ProbeSocket>(
    config: &TraceConfig,
    target: IpAddr,
    socket: S,
) -> Result<HopScanner<S>, TracerouteError> {
    config.validate().map_err(TracerouteError::ConfigError)?;
    scan_over(config, target, socket)
}

/// Build the scanner for an already validated `config`
fn scan_over<S: ProbeSocket>(
    config: &TraceConfig,
    target: IpAddr,
    socket: S,
) -> Result<HopScanner<S>, TracerouteError> {
    let version = IpVersion::of(&target);
    if socket.ip_version() != version {
        return Err(TracerouteError::ConfigError(format!(
            "{} transport cannot probe {}",
            socket.ip_version().description(),
            target
        )));
    }

    let identifier = config.identifier.unwrap_or_else(unique_identifier);
    Ok(HopScanner::new(
        socket,
        target,
        identifier,
        config.initial_ttl,
        config.max_hops,
        config.count,
        config.timeout,
        config.interval,
    ))
}

/// Start a trace described by `config`
///
/// # Errors
///
/// * `TracerouteError::ConfigError` - If the configuration is invalid
/// * `TracerouteError::ResolutionError` - If the target cannot be resolved
/// * `TracerouteError::InsufficientPermissions` - If no raw socket may be opened
/// * `TracerouteError::SocketError` - If the socket cannot be created or bound
///
/// # Examples
///
/// ```no_run
/// use shovel::{start_trace, Services, TraceConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = TraceConfig::builder().target("example.com").build()?;
/// let services = Services::new()?;
/// for hop in start_trace(&config, &services)? {
///     println!("{:>2} {:?}", hop.ttl, hop.addr);
/// }
/// # Ok(())
/// # }
/// ```
pub fn start_trace(
    config: &TraceConfig,
    resolver: &impl NameResolver,
) -> Result<HopScanner<Transport>, TracerouteError> {
    config.validate().map_err(TracerouteError::ConfigError)?;

    let target = resolve_target(config, resolver)?;
    let transport = open_transport(IpVersion::of(&target), config.source)?;

    info!(%target, "tracing {}", config.target);
    scan_over(config, target, transport)
}
