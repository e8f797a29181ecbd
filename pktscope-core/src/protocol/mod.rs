//! Protocol parsing framework.
//!
//! This module provides:
//! - [`Protocol`] trait for implementing parsers
//! - [`ProtocolRegistry`] for `(layer, type)` bindings and runtime port bindings
//! - [`FieldNode`] trees that every parser appends to
//! - Built-in parsers for the supported protocols
//!
//! ## Supported Protocols
//!
//! | Layer | Protocols | Registry key |
//! |-------|-----------|--------------|
//! | Link | Ethernet | `("ethernet", 1)` |
//! | Network | IPv4, IPv6, ARP | `("ip", 0x0800)`, `("ip", 0x86DD)`, `("arp", 0x0806)` |
//! | Transport | TCP, UDP | `("tcp", 6)`, `("udp", 17)` |
//! | Application | BGP | `("bgp", 179)` plus any port bound to `bgp` at runtime |
//!
//! ## Example
//!
//! ```rust
//! use pktscope_core::protocol::{default_registry, FieldNode};
//!
//! let registry = default_registry();
//! let frame: &[u8] = &[
//!     0xff, 0xff, 0xff, 0xff, 0xff, 0xff,  // dst mac
//!     0x00, 0x11, 0x22, 0x33, 0x44, 0x55,  // src mac
//!     0x88, 0xcc,                          // ethertype (LLDP)
//!     0x02, 0x07,                          // payload
//! ];
//!
//! let mut tree = FieldNode::root("Ethernet Frame", frame.len(), 0);
//! let result = registry.dispatch("ethernet", 1, &mut tree, frame, 0);
//! assert!(result.is_ok());
//! assert_eq!(tree.children[0].name, "Ethernet Header");
//! assert_eq!(tree.children[1].name, "Payload");
//! ```

mod context;
mod cursor;
mod field;
mod registry;

// Protocol implementations
mod arp;
mod bgp;
mod ethernet;
mod ipv4;
mod ipv6;
mod tcp;
mod udp;

// Test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;

pub use context::{NextLayer, ParseContext, ParseResult};
pub use cursor::Cursor;
pub use field::{BitRange, FieldNode, FieldValue, LayoutError};
pub use registry::{
    BuiltinProtocol, DispatchResult, PortBinding, PortTable, Protocol, ProtocolRegistry,
    Unclassified,
};

// Re-export protocol implementations
pub use arp::ArpProtocol;
pub use bgp::BgpProtocol;
pub use ethernet::EthernetProtocol;
pub use ipv4::Ipv4Protocol;
pub use ipv6::Ipv6Protocol;
pub use tcp::TcpProtocol;
pub use udp::UdpProtocol;

// Re-export protocol constants
pub use arp::operation as arp_operation;
pub use bgp::{capability_code as bgp_capability_code, message_type as bgp_message_type, BGP_PORT};
pub use ethernet::{ethertype, LINKTYPE_ETHERNET};
pub use ipv4::ip_proto;
pub use tcp::{flags as tcp_flags, options as tcp_options};

/// Create a registry with all built-in protocol parsers.
pub fn default_registry() -> ProtocolRegistry {
    let mut registry = ProtocolRegistry::new();

    // Layer 2
    registry.register("ethernet", u32::from(LINKTYPE_ETHERNET), EthernetProtocol, false);

    // Layer 3
    registry.register("ip", u32::from(ethertype::IPV4), Ipv4Protocol, false);
    registry.register("ip", u32::from(ethertype::IPV6), Ipv6Protocol, false);
    registry.register("arp", u32::from(ethertype::ARP), ArpProtocol, false);

    // Layer 4
    registry.register("tcp", u32::from(ip_proto::TCP), TcpProtocol, false);
    registry.register("udp", u32::from(ip_proto::UDP), UdpProtocol, false);

    // Application layer, recognized by port
    registry.register("bgp", u32::from(BGP_PORT), BgpProtocol, true);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_bindings() {
        let registry = default_registry();
        assert_eq!(registry.len(), 7);

        let keys: Vec<_> = registry
            .bindings()
            .into_iter()
            .map(|(layer, ty, p)| (layer.to_string(), ty, p.name()))
            .collect();
        assert!(keys.contains(&("ip".to_string(), 0x0800, "ipv4")));
        assert!(keys.contains(&("ip".to_string(), 0x86DD, "ipv6")));
        assert!(keys.contains(&("bgp".to_string(), 179, "bgp")));

        assert_eq!(registry.resolve_by_port(179).as_deref(), Some("bgp"));
        assert_eq!(registry.ports().len(), 1);
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = default_registry();
        let b = default_registry();
        a.register_protocol_port("bgp", 17179);
        assert!(a.has_protocol_for_port(17179));
        assert!(!b.has_protocol_for_port(17179));
    }
}
