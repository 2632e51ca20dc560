//! ASN lookup caching by announced prefix

use crate::traceroute::AsnInfo;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

/// Thread-safe cache for ASN lookups by CIDR prefix
///
/// One entry covers every address of its prefix.
#[derive(Default)]
pub struct AsnCache {
    cache: Mutex<HashMap<IpNet, AsnInfo>>,
}

impl AsnCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an IP address in the cache
    ///
    /// When several cached prefixes contain `ip`, the most specific one wins.
    pub fn get(&self, ip: &IpAddr) -> Option<AsnInfo> {
        let cache = self.cache.lock().expect("mutex poisoned");
        cache
            .iter()
            .filter(|(prefix, _)| prefix.contains(ip))
            .max_by_key(|(prefix, _)| prefix.prefix_len())
            .map(|(_, info)| info.clone())
    }

    /// Insert an ASN info entry into the cache
    pub fn insert(&self, prefix: IpNet, asn_info: AsnInfo) {
        let mut cache = self.cache.lock().expect("mutex poisoned");
        cache.insert(prefix.trunc(), asn_info);
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.cache.lock().expect("mutex poisoned").len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
