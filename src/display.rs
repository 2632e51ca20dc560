//! Rendering of hop results as a live table or as JSON lines

use crate::asn::AsnInfo;
use crate::services::Enrichment;
use crate::traceroute::HopResult;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Duration;

const COLUMNS: [(&str, usize); 9] = [
    ("Hop", 11),
    ("Hostname", 40),
    ("Address", 39),
    ("Sent", 5),
    ("Loss (%)", 9),
    ("Avg. RTT (ms)", 14),
    ("Min. RTT (ms)", 14),
    ("Max. RTT (ms)", 14),
    ("ASN", 0),
];

const NOT_AVAILABLE: &str = "n/a";

/// One enriched hop, ready to be printed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopRow {
    /// Distance of the hop
    pub ttl: u8,
    /// Responding address
    pub address: Option<String>,
    /// Reverse DNS name, or the address when there is none
    pub hostname: Option<String>,
    /// Probes sent in the round
    pub packets_sent: u16,
    /// Round-trip times in milliseconds
    pub rtts_ms: Vec<f64>,
    /// Loss in percent, one decimal
    pub loss_pct: f64,
    /// The destination answered
    pub reached: bool,
    /// The round ended on an error
    pub aborted: bool,
    /// Rendered ASN cell, `None` when unavailable
    pub asn: Option<String>,
    #[serde(skip)]
    avg_ms: Option<u128>,
    #[serde(skip)]
    min_ms: Option<u128>,
    #[serde(skip)]
    max_ms: Option<u128>,
}

impl HopRow {
    /// Enrich `hop` with reverse DNS and ASN data
    ///
    /// Lookups are skipped for misses. Failed lookups fall back to the raw
    /// address and to `n/a` respectively.
    pub fn build(hop: &HopResult, enrichment: &impl Enrichment, detailed_asn: bool) -> Self {
        let (hostname, asn) = match hop.addr {
            Some(ip) => {
                let hostname = enrichment
                    .reverse_lookup(ip)
                    .unwrap_or_else(|_| ip.to_string());
                let asn = enrichment
                    .lookup_asn(ip, detailed_asn)
                    .ok()
                    .and_then(|info| format_asn(&info, detailed_asn));
                (Some(hostname), asn)
            }
            None => (None, None),
        };

        Self {
            ttl: hop.ttl,
            address: hop.addr.map(|a| a.to_string()),
            hostname,
            packets_sent: hop.packets_sent,
            rtts_ms: hop.rtts.iter().map(|d| d.as_secs_f64() * 1000.0).collect(),
            loss_pct: loss_percent(hop.packet_loss()),
            reached: hop.reached,
            aborted: hop.aborted,
            asn,
            avg_ms: hop.avg_rtt().map(round_ms),
            min_ms: hop.min_rtt().map(round_ms),
            max_ms: hop.max_rtt().map(round_ms),
        }
    }

    /// True when nobody answered in this round
    pub fn is_miss(&self) -> bool {
        self.address.is_none()
    }
}

/// Render the ASN cell
///
/// Plain mode links to bgp.tools. Detailed mode prefixes the first word of
/// the AS name, with "..." when the name was cut. AS 0 has no link.
pub fn format_asn(info: &AsnInfo, detailed: bool) -> Option<String> {
    if !info.is_public() {
        return None;
    }
    let link = format!("https://bgp.tools/as/{}", info.asn);
    if !detailed || info.name.is_empty() {
        return Some(link);
    }

    let first_word = info.name.split(' ').next().unwrap_or_default();
    let ellipsis = if info.name.contains(' ') { "..." } else { "" };
    Some(format!("({first_word}{ellipsis}) {link}"))
}

/// Loss fraction as a percentage rounded to one decimal
pub fn loss_percent(loss: f64) -> f64 {
    (loss * 1000.0).round() / 10.0
}

fn round_ms(rtt: Duration) -> u128 {
    (rtt.as_micros() + 500) / 1000
}

/// Title line of the table
pub fn title(host: &str, detailed: bool) -> String {
    let detailed = if detailed { "True" } else { "False" };
    format!("Traceroute to {host} [Detailed: {detailed}]")
}

fn cell(text: &str, width: usize) -> String {
    if width == 0 {
        text.to_string()
    } else {
        format!("{text:<width$}")
    }
}

/// Live table printed one row per completed round
pub struct TableRenderer<W: Write> {
    out: W,
}

impl<W: Write> TableRenderer<W> {
    /// Render to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print the title and the column headers
    pub fn header(&mut self, host: &str, detailed: bool) -> io::Result<()> {
        writeln!(self.out, "{}", title(host, detailed).bold())?;
        let line: Vec<String> = COLUMNS
            .iter()
            .map(|(name, width)| cell(name, *width).bold().to_string())
            .collect();
        writeln!(self.out, "{}", line.join(" ").trim_end())?;
        self.out.flush()
    }

    /// Print one hop
    pub fn row(&mut self, row: &HopRow) -> io::Result<()> {
        let cells: Vec<String> = if row.is_miss() {
            COLUMNS
                .iter()
                .enumerate()
                .map(|(i, (_, width))| {
                    let text = if i == 0 { "no response" } else { "*" };
                    cell(text, *width).red().bold().to_string()
                })
                .collect()
        } else {
            let ms = |v: Option<u128>| v.map_or_else(|| "*".to_string(), |v| v.to_string());
            let loss = cell(&format!("{:.1}", row.loss_pct), COLUMNS[4].1);
            vec![
                cell(&row.ttl.to_string(), COLUMNS[0].1).green().to_string(),
                cell(row.hostname.as_deref().unwrap_or_default(), COLUMNS[1].1)
                    .blue()
                    .to_string(),
                cell(row.address.as_deref().unwrap_or_default(), COLUMNS[2].1),
                cell(&row.packets_sent.to_string(), COLUMNS[3].1),
                if row.loss_pct > 0.0 {
                    loss.red().bold().to_string()
                } else {
                    loss
                },
                cell(&ms(row.avg_ms), COLUMNS[5].1),
                cell(&ms(row.min_ms), COLUMNS[6].1),
                cell(&ms(row.max_ms), COLUMNS[7].1),
                match &row.asn {
                    Some(asn) => asn.clone(),
                    None => NOT_AVAILABLE.red().bold().to_string(),
                },
            ]
        };
        writeln!(self.out, "{}", cells.join(" ").trim_end())?;
        self.out.flush()
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One JSON object per line
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    /// Render to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print one hop
    pub fn row(&mut self, row: &HopRow) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, row)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
