//! pktscope - Dissect raw frames into offset-exact field trees.
//!
//! This library holds the command-line front end over
//! [`pktscope_core`]: argument parsing, packet input and output formatting.
//!
//! # Example
//!
//! ```
//! use pktscope::cli::{OutputFormat, OutputFormatter};
//! use pktscope_core::{default_registry, dissect_hex, StartLayer};
//!
//! let registry = default_registry();
//! let d = dissect_hex(&registry, "ffffffffffffffffffffffffffffffff001304", StartLayer::Bgp)?;
//!
//! let mut out = Vec::new();
//! OutputFormatter::new(OutputFormat::Jsonl).write(&d, &mut out)?;
//! assert!(String::from_utf8(out)?.contains("KEEPALIVE"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
