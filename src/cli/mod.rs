//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Packet input from arguments, files and stdin
//! - Output formatting (tree, JSON, JSON Lines)

mod args;
mod input;
mod output;

pub use args::{parse_port_spec, Args, PortSpec, StartLayerArg};
pub use input::{collect_packets, read_packet_lines};
pub use output::{OutputFormat, OutputFormatter};
