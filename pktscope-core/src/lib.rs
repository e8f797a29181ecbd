//! # pktscope-core
//!
//! Offset-exact packet dissection.
//!
//! This crate turns a raw byte buffer, normally an Ethernet frame, into a
//! tree of named fields. Every node records the absolute byte range it
//! covers, so a front end can highlight any field in a hex view. Parsers
//! chain from the link layer up to BGP. Ports can be bound to application
//! protocols at runtime, so traffic on a non-standard port still dissects.
//!
//! ## Quick Start
//!
//! ```rust
//! use pktscope_core::{default_registry, dissect_hex, StartLayer};
//!
//! let registry = default_registry();
//!
//! // BGP KEEPALIVE
//! let d = dissect_hex(
//!     &registry,
//!     "ffffffffffffffffffffffffffffffff 0013 04",
//!     StartLayer::Bgp,
//! )
//! .unwrap();
//!
//! assert!(d.valid);
//! assert_eq!(d.tree.children[0].name, "BGP Packet");
//!
//! // Serve BGP on an emulator port as well
//! registry.register_protocol_port("bgp", 17179);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        pktscope-core                                |
//! +---------------------------------------------------------------------+
//! |  protocol/   - Protocol trait, FieldNode, registry, 7 parsers       |
//! |  dissect     - Start layers, dissection driver, hex input           |
//! |  format/     - Address and prefix formatting                        |
//! |  error/      - Error types                                          |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Supported Protocols
//!
//! | Layer | Protocols |
//! |-------|-----------|
//! | Link | Ethernet |
//! | Network | IPv4, IPv6, ARP |
//! | Transport | TCP, UDP |
//! | Application | BGP |

pub mod dissect;
pub mod error;
pub mod format;
pub mod protocol;

// Re-export commonly used types at crate root for convenience
pub use dissect::{dissect, dissect_frame, dissect_hex, parse_hex, Dissection, StartLayer};
pub use error::{Error, ErrorKind, ProtocolError, Result};
pub use format::{format_ipv4, format_ipv6, format_mac};
pub use protocol::{
    default_registry, BuiltinProtocol, FieldNode, FieldValue, NextLayer, ParseContext,
    ParseResult, PortBinding, Protocol, ProtocolRegistry,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
