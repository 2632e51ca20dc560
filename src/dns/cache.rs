//! Reverse DNS lookup caching functionality

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    hostname: Option<String>,
    inserted_at: Instant,
}

/// Thread-safe cache for reverse DNS answers
///
/// Failed lookups are remembered as `None`, so an address without a PTR
/// record is only queried once per TTL.
pub struct RdnsCache {
    cache: Mutex<HashMap<IpAddr, CacheEntry>>,
    ttl: Duration,
}

impl RdnsCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new cache with default TTL (1 hour)
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(3600))
    }

    /// Look up an IP address
    ///
    /// The outer `Option` tells whether the address is cached at all, the
    /// inner one whether it has a hostname.
    pub fn get(&self, ip: &IpAddr) -> Option<Option<String>> {
        let mut cache = self.cache.lock().expect("mutex poisoned");
        match cache.get(ip) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.hostname.clone()),
            Some(_) => {
                cache.remove(ip);
                None
            }
            None => None,
        }
    }

    /// Remember the answer for `ip`
    pub fn insert(&self, ip: IpAddr, hostname: Option<String>) {
        let mut cache = self.cache.lock().expect("mutex poisoned");
        cache.insert(
            ip,
            CacheEntry {
                hostname,
                inserted_at: Instant::now(),
            },
        );
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

impl Default for RdnsCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}
