//! ARP protocol parser.
//!
//! Address lengths come from the header, so the packet size is
//! `8 + 2 * hw_len + 2 * proto_len` and is re-checked before any address
//! is read.

use compact_str::{format_compact, CompactString};

use super::context::LayerResult;
use super::cursor::Cursor;
use super::ethernet::ethertype;
use super::{FieldNode, NextLayer, ParseContext, ParseResult, Protocol};
use crate::error::ProtocolError;
use crate::format::{format_hw_address, format_ipv4, format_ipv6_full};

/// Fixed part of an ARP packet.
const FIXED_LEN: usize = 8;

/// ARP operation codes.
pub mod operation {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
    pub const RARP_REQUEST: u16 = 3;
    pub const RARP_REPLY: u16 = 4;
    pub const DRARP_REQUEST: u16 = 5;
    pub const DRARP_REPLY: u16 = 6;
    pub const DRARP_ERROR: u16 = 7;
    pub const INARP_REQUEST: u16 = 8;
    pub const INARP_REPLY: u16 = 9;
}

fn operation_name(op: u16) -> &'static str {
    match op {
        operation::REQUEST => "ARP Request",
        operation::REPLY => "ARP Reply",
        operation::RARP_REQUEST => "RARP Request",
        operation::RARP_REPLY => "RARP Reply",
        operation::DRARP_REQUEST => "DRARP Request",
        operation::DRARP_REPLY => "DRARP Reply",
        operation::DRARP_ERROR => "DRARP Error",
        operation::INARP_REQUEST => "InARP Request",
        operation::INARP_REPLY => "InARP Reply",
        _ => "Unknown",
    }
}

fn hardware_type_name(hw: u16) -> &'static str {
    match hw {
        1 => "Ethernet",
        6 => "IEEE 802",
        7 => "ARCNET",
        15 => "Frame Relay",
        16 | 19 => "ATM",
        17 => "HDLC",
        18 => "Fibre Channel",
        20 => "Serial Line",
        _ => "Unknown",
    }
}

fn protocol_type_name(pt: u16) -> &'static str {
    match pt {
        ethertype::IPV4 => "IPv4",
        ethertype::IPV6 => "IPv6",
        _ => "Unknown",
    }
}

/// Render a protocol address according to the declared protocol type.
fn format_protocol_address(protocol_type: u16, bytes: &[u8]) -> CompactString {
    let formatted = match protocol_type {
        ethertype::IPV4 => format_ipv4(bytes),
        ethertype::IPV6 => format_ipv6_full(bytes),
        _ => None,
    };
    match formatted {
        Some(s) => CompactString::from(s),
        None => CompactString::from(hex::encode_upper(bytes)),
    }
}

/// ARP protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpProtocol;

impl Protocol for ArpProtocol {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn display_name(&self) -> &'static str {
        "ARP"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_packet(buf, parent, ctx.offset).into()
    }
}

impl ArpProtocol {
    fn parse_packet(&self, buf: &[u8], parent: &mut FieldNode, offset: usize) -> LayerResult {
        let mut cur = Cursor::new(buf, offset, "ARP");
        cur.ensure(FIXED_LEN)?;

        let hardware_type = cur.read_u16()?;
        let protocol_type = cur.read_u16()?;
        let hw_len = usize::from(cur.read_u8()?);
        let proto_len = usize::from(cur.read_u8()?);
        let op = cur.read_u16()?;

        let total = FIXED_LEN + 2 * hw_len + 2 * proto_len;
        if buf.len() < offset + total {
            return Err(ProtocolError::too_short("ARP", offset + total, buf.len()));
        }

        let node = parent.push(FieldNode::new("ARP Packet", offset, total));
        node.push(FieldNode::leaf(
            "Hardware Type",
            offset,
            2,
            format_compact!("{hardware_type} ({})", hardware_type_name(hardware_type)),
        ));
        node.push(FieldNode::leaf(
            "Protocol Type",
            offset + 2,
            2,
            format_compact!("0x{protocol_type:04x} ({})", protocol_type_name(protocol_type)),
        ));
        node.push(FieldNode::leaf(
            "Hardware Address Length",
            offset + 4,
            1,
            format_compact!("{hw_len} bytes"),
        ));
        node.push(FieldNode::leaf(
            "Protocol Address Length",
            offset + 5,
            1,
            format_compact!("{proto_len} bytes"),
        ));
        node.push(FieldNode::leaf(
            "Operation",
            offset + 6,
            2,
            format_compact!("{op} ({})", operation_name(op)),
        ));

        for (hw_name, proto_name) in [
            ("Sender Hardware Address", "Sender Protocol Address"),
            ("Target Hardware Address", "Target Protocol Address"),
        ] {
            let at = cur.pos();
            let hw = cur.read_bytes(hw_len)?;
            node.push(FieldNode::leaf(hw_name, at, hw_len, format_hw_address(hw)));

            let at = cur.pos();
            let proto = cur.read_bytes(proto_len)?;
            node.push(FieldNode::leaf(
                proto_name,
                at,
                proto_len,
                format_protocol_address(protocol_type, proto),
            ));
        }

        // ARP carries no payload; anything after it is frame padding
        let next = NextLayer::trailing(buf.len(), offset + total, u32::from(protocol_type), None);
        Ok((total, next))
    }
}
