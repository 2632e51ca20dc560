//! shovel - ICMP traceroute with reverse DNS and ASN lookup
//!
//! The library sends ICMP echo probes with increasing TTLs toward a target
//! and yields one [`HopResult`] per TTL through the lazy [`HopScanner`]
//! iterator. Probing is single-threaded and blocking; name resolution and
//! enrichment lookups go through [`Services`].
//!
//! # Examples
//!
//! ```no_run
//! use shovel::{start_trace, Services, TraceConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TraceConfig::builder().target("1.1.1.1").count(3).build()?;
//! let services = Services::new()?;
//!
//! for hop in start_trace(&config, &services)? {
//!     match hop.addr {
//!         Some(addr) => println!("{:>2} {} {:?}", hop.ttl, addr, hop.avg_rtt()),
//!         None => println!("{:>2} *", hop.ttl),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod asn;
pub mod display;
pub mod dns;
pub mod services;
pub mod socket;
pub mod traceroute;

#[cfg(test)]
mod tests;

// Re-export core types for library users
pub use asn::AsnInfo;
pub use dns::NameResolver;
pub use services::{Enrichment, Services};
pub use socket::factory::{open_transport, Transport};
pub use socket::{IpVersion, ProbeInfo, ProbeResponse, ProbeSocket, ResponseType};
pub use traceroute::{
    start_trace, start_trace_with_socket, ConfigWarning, HopResult, HopScanner, Prober,
    ScanSession, TraceConfig, TraceConfigBuilder, TracerouteError,
};
