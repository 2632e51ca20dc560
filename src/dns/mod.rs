//! DNS functionality for target resolution and reverse lookups

pub mod cache;
pub mod resolve;
pub mod reverse;

pub use cache::RdnsCache;
pub use resolve::{resolve_host, NameResolver};
pub use reverse::{create_resolver, reverse_dns_lookup, ReverseDnsError};
