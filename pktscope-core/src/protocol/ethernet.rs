//! Ethernet II protocol parser.

use compact_str::format_compact;

use super::context::LayerResult;
use super::cursor::Cursor;
use super::{FieldNode, NextLayer, ParseContext, ParseResult, Protocol};
use crate::format::format_hw_address;

/// Link type constant for Ethernet.
pub const LINKTYPE_ETHERNET: u16 = 1;

/// Ethernet II header length.
pub const HEADER_LEN: usize = 14;

/// Well-known EtherType values (IEEE 802).
pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const QINQ: u16 = 0x88A8;
    pub const MPLS: u16 = 0x8847;
    pub const MPLS_MULTICAST: u16 = 0x8848;
    pub const PPPOE_DISCOVERY: u16 = 0x8863;
    pub const PPPOE_SESSION: u16 = 0x8864;
    pub const LLDP: u16 = 0x88CC;

    /// Values below this are IEEE 802.3 payload lengths, not types.
    pub const MIN_ETHERTYPE: u16 = 0x0600;
}

/// Get the display name of an EtherType.
fn ethertype_name(value: u16) -> Option<&'static str> {
    match value {
        ethertype::IPV4 => Some("IPv4"),
        ethertype::IPV6 => Some("IPv6"),
        ethertype::ARP => Some("ARP"),
        ethertype::VLAN => Some("VLAN"),
        ethertype::QINQ => Some("QinQ"),
        ethertype::MPLS | ethertype::MPLS_MULTICAST => Some("MPLS"),
        ethertype::PPPOE_DISCOVERY => Some("PPPoE Discovery"),
        ethertype::PPPOE_SESSION => Some("PPPoE Session"),
        ethertype::LLDP => Some("LLDP"),
        _ => None,
    }
}

/// Layer that handles a given EtherType.
fn next_layer_for(value: u16) -> Option<&'static str> {
    match value {
        ethertype::IPV4 | ethertype::IPV6 => Some("ip"),
        ethertype::ARP => Some("arp"),
        ethertype::VLAN | ethertype::QINQ => Some("vlan"),
        ethertype::MPLS | ethertype::MPLS_MULTICAST => Some("mpls"),
        ethertype::PPPOE_DISCOVERY | ethertype::PPPOE_SESSION => Some("pppoe"),
        ethertype::LLDP => Some("lldp"),
        _ => None,
    }
}

/// Ethernet II protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetProtocol;

impl Protocol for EthernetProtocol {
    fn name(&self) -> &'static str {
        "ethernet"
    }

    fn display_name(&self) -> &'static str {
        "Ethernet"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_header(buf, parent, ctx.offset).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["ip", "arp", "vlan", "mpls", "pppoe", "lldp"]
    }
}

impl EthernetProtocol {
    fn parse_header(&self, buf: &[u8], parent: &mut FieldNode, offset: usize) -> LayerResult {
        let mut cur = Cursor::new(buf, offset, "Ethernet");
        cur.ensure(HEADER_LEN)?;

        let header = parent.push(FieldNode::new("Ethernet Header", offset, HEADER_LEN));

        let dst = cur.read_bytes(6)?;
        header.push(FieldNode::leaf(
            "Destination MAC",
            offset,
            6,
            format_hw_address(dst),
        ));

        let src = cur.read_bytes(6)?;
        header.push(FieldNode::leaf(
            "Source MAC",
            offset + 6,
            6,
            format_hw_address(src),
        ));

        let type_len = cur.read_u16()?;
        let rendered = if type_len < ethertype::MIN_ETHERTYPE {
            format_compact!("Length: {type_len}")
        } else {
            match ethertype_name(type_len) {
                Some(name) => format_compact!("0x{type_len:04x} ({name})"),
                None => format_compact!("Unknown (0x{type_len:04x})"),
            }
        };
        header.push(FieldNode::leaf("Type/Length", offset + 12, 2, rendered));

        // 802.3 frames carry LLC, which is left raw
        let layer = if type_len < ethertype::MIN_ETHERTYPE {
            None
        } else {
            next_layer_for(type_len)
        };
        let next = NextLayer::trailing(buf.len(), cur.pos(), u32::from(type_len), layer);
        Ok((HEADER_LEN, next))
    }
}
