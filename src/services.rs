//! Service container for name resolution and hop enrichment
//!
//! The probing core is synchronous, while the DNS client is async. `Services`
//! owns a single-threaded tokio runtime and blocks on it, so callers see plain
//! blocking calls.

use crate::asn::{lookup_asn, AsnCache, AsnInfo, AsnLookupError};
use crate::dns::{
    create_resolver, resolve_host, reverse_dns_lookup, NameResolver, RdnsCache,
    ReverseDnsError,
};
use crate::socket::IpVersion;
use crate::traceroute::TracerouteError;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use tokio::runtime::Runtime;
use tracing::debug;

/// Per-hop lookups used by the presentation layer
///
/// Failures only affect what is displayed, never the scan.
pub trait Enrichment {
    /// Hostname of `ip`
    fn reverse_lookup(&self, ip: IpAddr) -> Result<String, ReverseDnsError>;

    /// Origin AS of `ip`; the AS name is filled in when `detailed` is set
    fn lookup_asn(&self, ip: IpAddr, detailed: bool) -> Result<AsnInfo, AsnLookupError>;
}

/// Container for the DNS backed services of one process
///
/// # Examples
///
/// ```no_run
/// use shovel::services::{Enrichment, Services};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let services = Services::new()?;
/// let asn = services.lookup_asn("1.1.1.1".parse()?, true)?;
/// println!("AS{} {}", asn.asn, asn.name);
/// # Ok(())
/// # }
/// ```
pub struct Services {
    runtime: Runtime,
    resolver: TokioResolver,
    asn_cache: AsnCache,
    rdns_cache: RdnsCache,
}

impl Services {
    /// Create services backed by Cloudflare's public resolvers
    pub fn new() -> std::io::Result<Self> {
        Self::with_config(ResolverConfig::cloudflare())
    }

    /// Create services querying the name servers of `config`
    pub fn with_config(config: ResolverConfig) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let resolver = {
            let _guard = runtime.enter();
            create_resolver(config)
        };
        Ok(Self {
            runtime,
            resolver,
            asn_cache: AsnCache::new(),
            rdns_cache: RdnsCache::with_default_ttl(),
        })
    }

    /// ASN answers gathered so far
    pub fn asn_cache(&self) -> &AsnCache {
        &self.asn_cache
    }

    /// Reverse DNS answers gathered so far
    pub fn rdns_cache(&self) -> &RdnsCache {
        &self.rdns_cache
    }
}

impl NameResolver for Services {
    fn resolve(
        &self,
        host: &str,
        family: Option<IpVersion>,
    ) -> Result<Vec<IpAddr>, TracerouteError> {
        self.runtime
            .block_on(resolve_host(&self.resolver, host, family))
    }
}

impl Enrichment for Services {
    fn reverse_lookup(&self, ip: IpAddr) -> Result<String, ReverseDnsError> {
        if let Some(cached) = self.rdns_cache.get(&ip) {
            return cached.ok_or(ReverseDnsError::NotFound);
        }

        let result = self
            .runtime
            .block_on(reverse_dns_lookup(ip, &self.resolver));
        match &result {
            Ok(hostname) => self.rdns_cache.insert(ip, Some(hostname.clone())),
            Err(e) => {
                debug!(%ip, "reverse lookup failed: {}", e);
                self.rdns_cache.insert(ip, None);
            }
        }
        result
    }

    fn lookup_asn(&self, ip: IpAddr, detailed: bool) -> Result<AsnInfo, AsnLookupError> {
        let result = self.runtime.block_on(lookup_asn(
            ip,
            detailed,
            &self.resolver,
            &self.asn_cache,
        ));
        if let Err(e) = &result {
            debug!(%ip, "ASN lookup failed: {}", e);
        }
        result
    }
}
