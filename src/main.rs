//! shovel - ICMP traceroute with a live hop table, reverse DNS and ASN lookup.
//!
//! This is the command-line interface for the shovel library.

#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use shovel::display::{HopRow, JsonRenderer, TableRenderer};
use shovel::socket::utils::{is_root, sudo_hint};
use shovel::{start_trace, IpVersion, Services, TraceConfig, TracerouteError};
use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Get the version string for shovel
fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Command-line interface of shovel.
#[derive(Parser, Debug)]
#[clap(author, about = "ICMP traceroute with reverse DNS and ASN lookup", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trace the route to a host
    Trace(TraceArgs),
    /// Print the version
    Version,
}

#[derive(clap::Args, Debug)]
struct TraceArgs {
    /// Target hostname or IP address
    address: String,

    /// Number of packets to send per hop
    #[clap(long, default_value_t = 1)]
    count: u16,

    /// Interval between packets in seconds
    #[clap(long, default_value = "0", value_parser = parse_seconds)]
    interval: Duration,

    /// Timeout for each packet in seconds
    #[clap(long, default_value = "25", value_parser = parse_seconds)]
    timeout: Duration,

    /// Initial time to live
    #[clap(long, default_value_t = 1)]
    ttl: u8,

    /// Maximum number of hops
    #[clap(long, default_value_t = 30)]
    max_hops: u8,

    /// Address family used to resolve the host (4 or 6)
    #[clap(long)]
    family: Option<u8>,

    /// Identifier of the echo requests (random when omitted)
    #[clap(long)]
    id: Option<u16>,

    /// Source address to send from
    #[clap(long)]
    source: Option<IpAddr>,

    /// Show the AS name next to the ASN link
    #[clap(long)]
    detailed_asn: bool,

    /// Print one JSON object per hop instead of a table
    #[clap(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Parse a non-negative, possibly fractional number of seconds
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' is not a valid duration", value))
}

/// Log level used when RUST_LOG is not set
fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Turn the command line into a validated trace configuration
fn build_config(args: &TraceArgs) -> Result<TraceConfig, TracerouteError> {
    let family = IpVersion::from_family(args.family).map_err(TracerouteError::InvalidFamily)?;

    let mut builder = TraceConfig::builder()
        .target(args.address.clone())
        .count(args.count)
        .interval(args.interval)
        .timeout(args.timeout)
        .initial_ttl(args.ttl)
        .max_hops(args.max_hops)
        .detailed_asn(args.detailed_asn);
    if let Some(family) = family {
        builder = builder.family(family);
    }
    if let Some(id) = args.id {
        builder = builder.identifier(id);
    }
    if let Some(source) = args.source {
        builder = builder.source(source);
    }

    let (config, warnings) = builder
        .build()
        .map_err(TracerouteError::ConfigError)?
        .normalize();
    for warning in warnings {
        warn!("{}", warning);
    }
    Ok(config)
}

fn run_trace(args: &TraceArgs) -> Result<()> {
    let config = build_config(args)?;
    let services = Services::new()?;
    let scanner = start_trace(&config, &services)?;
    debug!(session = ?scanner.session(), "scan started");

    let stdout = std::io::stdout();
    if args.json {
        let mut renderer = JsonRenderer::new(stdout.lock());
        for hop in scanner {
            renderer.row(&HopRow::build(&hop, &services, config.detailed_asn))?;
        }
    } else {
        let mut renderer = TableRenderer::new(stdout.lock());
        renderer.header(&config.target, config.detailed_asn)?;
        for hop in scanner {
            renderer.row(&HopRow::build(&hop, &services, config.detailed_asn))?;
        }
    }
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<TracerouteError>() {
        Some(TracerouteError::InsufficientPermissions {
            required,
            suggestion,
        }) => {
            eprintln!("Error: Insufficient permissions");
            eprintln!("Required: {}", required);
            eprintln!("Suggestion: {}", suggestion);
            if !is_root() {
                eprintln!("Try: {}", sudo_hint());
            }
        }
        Some(TracerouteError::InvalidFamily(_)) => eprintln!("{}", err),
        _ => eprintln!("Error: {:#}", err),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("{}", get_version());
            ExitCode::SUCCESS
        }
        Command::Trace(args) => {
            init_logging(args.verbose);
            match run_trace(&args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    report_error(&e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
