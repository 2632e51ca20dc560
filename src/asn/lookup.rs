//! ASN lookup functionality using Team Cymru's DNS service

use crate::asn::cache::AsnCache;
use crate::traceroute::AsnInfo;
use hickory_resolver::TokioResolver;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;

/// Error type for ASN lookup operations
#[derive(Debug, thiserror::Error)]
pub enum AsnLookupError {
    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    /// Invalid response format
    #[error("Invalid ASN response format")]
    InvalidFormat,

    /// No ASN data found
    #[error("No ASN data found")]
    NotFound,
}

/// Name for addresses that are never announced on the public internet
pub fn special_use_name(ip: &IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => special_use_name_v4(v4),
        IpAddr::V6(v6) => special_use_name_v6(v6),
    }
}

fn special_use_name_v4(ip: &Ipv4Addr) -> Option<&'static str> {
    let octets = ip.octets();
    if ip.is_loopback() {
        Some("Loopback")
    } else if ip.is_private() {
        Some("Private Network")
    } else if octets[0] == 100 && (64..=127).contains(&octets[1]) {
        Some("Carrier Grade NAT")
    } else if ip.is_link_local() {
        Some("Link Local")
    } else if ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_multicast()
    {
        Some("Special Use")
    } else {
        None
    }
}

fn special_use_name_v6(ip: &Ipv6Addr) -> Option<&'static str> {
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Some("Loopback")
    } else if (first & 0xfe00) == 0xfc00 {
        Some("Private Network")
    } else if (first & 0xffc0) == 0xfe80 {
        Some("Link Local")
    } else if ip.is_unspecified()
        || ip.is_multicast()
        || (first == 0x2001 && ip.segments()[1] == 0x0db8)
    {
        Some("Special Use")
    } else {
        None
    }
}

/// Build the Team Cymru origin query name for `ip`
///
/// IPv4 uses the reversed octets under `origin.asn.cymru.com`, IPv6 the
/// reversed nibbles under `origin6.asn.cymru.com`.
pub fn origin_query(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.origin.asn.cymru.com", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let nibbles: Vec<String> = v6
                .octets()
                .iter()
                .rev()
                .flat_map(|byte| [byte & 0x0f, byte >> 4])
                .map(|nibble| format!("{nibble:x}"))
                .collect();
            format!("{}.origin6.asn.cymru.com", nibbles.join("."))
        }
    }
}

/// Parse an origin record: "ASN | prefix | CC | registry | allocated"
///
/// Multi-origin prefixes list several AS numbers separated by spaces; the
/// first one is used.
pub fn parse_origin_record(txt: &str) -> Result<(AsnInfo, IpNet), AsnLookupError> {
    let parts: Vec<&str> = txt.split('|').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(AsnLookupError::InvalidFormat);
    }

    let asn = parts[0]
        .split_whitespace()
        .next()
        .and_then(|a| a.parse::<u32>().ok())
        .ok_or(AsnLookupError::InvalidFormat)?;
    let prefix = parts[1]
        .parse::<IpNet>()
        .map_err(|_| AsnLookupError::InvalidFormat)?;

    let info = AsnInfo {
        asn,
        prefix: parts[1].to_string(),
        country_code: parts[2].to_string(),
        registry: parts.get(3).map(|r| r.to_string()).unwrap_or_default(),
        name: String::new(),
    };
    Ok((info, prefix))
}

/// Extract the AS name from an "ASN | CC | registry | allocated | name" record
pub fn parse_as_name(txt: &str) -> Option<String> {
    txt.split('|')
        .map(str::trim)
        .nth(4)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

async fn first_txt(resolver: &TokioResolver, query: String) -> Result<String, AsnLookupError> {
    let lookup = resolver
        .txt_lookup(query)
        .await
        .map_err(|e| AsnLookupError::DnsError(e.to_string()))?;

    let record = lookup.iter().next().ok_or(AsnLookupError::NotFound)?;
    Ok(record
        .iter()
        .map(|data| String::from_utf8_lossy(data))
        .collect::<Vec<_>>()
        .join(""))
}

/// Look up the origin AS of `ip`
///
/// The AS name costs a second query and is only fetched when `with_name` is
/// set. Special-use addresses are answered locally with AS 0.
pub async fn lookup_asn(
    ip: IpAddr,
    with_name: bool,
    resolver: &TokioResolver,
    cache: &AsnCache,
) -> Result<AsnInfo, AsnLookupError> {
    if let Some(cached) = cache.get(&ip) {
        if !with_name || !cached.name.is_empty() || !cached.is_public() {
            return Ok(cached);
        }
    }

    if let Some(name) = special_use_name(&ip) {
        let host = IpNet::from(ip);
        let asn_info = AsnInfo {
            asn: 0,
            prefix: host.to_string(),
            country_code: "N/A".to_string(),
            registry: "N/A".to_string(),
            name: name.to_string(),
        };
        cache.insert(host, asn_info.clone());
        return Ok(asn_info);
    }

    let txt = first_txt(resolver, origin_query(&ip)).await?;
    let (mut asn_info, prefix) = parse_origin_record(&txt)?;

    if with_name {
        match first_txt(resolver, format!("AS{}.asn.cymru.com", asn_info.asn)).await {
            Ok(as_txt) => asn_info.name = parse_as_name(&as_txt).unwrap_or_default(),
            Err(e) => debug!(asn = asn_info.asn, "AS name lookup failed: {}", e),
        }
    }

    cache.insert(prefix, asn_info.clone());
    Ok(asn_info)
}
