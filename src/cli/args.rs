//! Command-line argument definitions.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use pktscope_core::StartLayer;

use super::OutputFormat;

/// Layer the first parser runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StartLayerArg {
    /// Ethernet frame
    L2,
    /// IPv4 or IPv6 packet
    L3,
    /// TCP segment
    Tcp,
    /// UDP datagram
    Udp,
    /// BGP messages
    Bgp,
}

impl From<StartLayerArg> for StartLayer {
    fn from(arg: StartLayerArg) -> Self {
        match arg {
            StartLayerArg::L2 => StartLayer::Ethernet,
            StartLayerArg::L3 => StartLayer::Ip,
            StartLayerArg::Tcp => StartLayer::Tcp,
            StartLayerArg::Udp => StartLayer::Udp,
            StartLayerArg::Bgp => StartLayer::Bgp,
        }
    }
}

/// A `LAYER=PORT` binding from `--port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub layer: String,
    pub port: u16,
}

/// Parse `LAYER=PORT`, e.g. `bgp=17179`.
pub fn parse_port_spec(s: &str) -> Result<PortSpec, String> {
    let (layer, port) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LAYER=PORT, got '{s}'"))?;
    let layer = layer.trim();
    if layer.is_empty() {
        return Err(format!("missing layer name in '{s}'"));
    }
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid port in '{s}': {e}"))?;
    Ok(PortSpec {
        layer: layer.to_ascii_lowercase(),
        port,
    })
}

/// Dissect raw frames into offset-exact field trees.
#[derive(Parser, Debug)]
#[command(name = "pktscope")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hex-encoded packets, one per argument; `-` reads packets from stdin
    #[arg(value_name = "HEX")]
    pub packets: Vec<String>,

    /// Read hex packets from a file, one per line (`#` starts a comment line)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Layer the first parser runs at
    #[arg(short = 's', long = "start-layer", value_enum, default_value = "l2")]
    pub start_layer: StartLayerArg,

    /// Byte offset where dissection starts
    #[arg(long = "offset", default_value = "0")]
    pub offset: usize,

    /// Bind a port to an application layer for this run (repeatable)
    #[arg(short = 'p', long = "port", value_name = "LAYER=PORT", value_parser = parse_port_spec)]
    pub ports: Vec<PortSpec>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "tree")]
    pub format: OutputFormat,

    /// List registered protocol parsers
    #[arg(long = "list-protocols")]
    pub list_protocols: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Check if packets come from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.packets.iter().any(|p| p == "-")
    }

    /// Check if this is an info-only command (no packets needed).
    pub fn is_info_only(&self) -> bool {
        self.list_protocols
    }

    /// Tracing filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
