//! IPv4 protocol parser.

use compact_str::format_compact;

use super::context::{ensure_consumed, LayerResult};
use super::cursor::Cursor;
use super::{FieldNode, FieldValue, NextLayer, ParseContext, ParseResult, Protocol};
use crate::error::ProtocolError;
use crate::format::format_ipv4;

/// Minimum IPv4 header length (IHL = 5).
pub const MIN_HEADER_LEN: usize = 20;

/// IP protocol numbers (IANA), shared by the IPv4 protocol and IPv6 next-header fields.
pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const IGMP: u8 = 2;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const IPV6: u8 = 41;
    pub const GRE: u8 = 47;
    pub const ESP: u8 = 50;
    pub const AH: u8 = 51;
    pub const ICMPV6: u8 = 58;
    pub const OSPF: u8 = 89;
    pub const SCTP: u8 = 132;
}

/// Get the name of an IP protocol number.
pub(super) fn protocol_name(proto: u8) -> &'static str {
    match proto {
        ip_proto::ICMP => "ICMP",
        ip_proto::IGMP => "IGMP",
        ip_proto::TCP => "TCP",
        ip_proto::UDP => "UDP",
        ip_proto::IPV6 => "IPv6",
        ip_proto::GRE => "GRE",
        ip_proto::ESP => "ESP",
        ip_proto::AH => "AH",
        ip_proto::ICMPV6 => "ICMPv6",
        ip_proto::OSPF => "OSPF",
        ip_proto::SCTP => "SCTP",
        _ => "Unknown",
    }
}

/// Layer that handles a given IP protocol number.
pub(super) fn transport_layer(proto: u8) -> Option<&'static str> {
    match proto {
        ip_proto::TCP => Some("tcp"),
        ip_proto::UDP => Some("udp"),
        ip_proto::ICMP => Some("icmp"),
        ip_proto::IGMP => Some("igmp"),
        ip_proto::ICMPV6 => Some("icmpv6"),
        _ => None,
    }
}

/// IPv4 protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Protocol;

impl Protocol for Ipv4Protocol {
    fn name(&self) -> &'static str {
        "ipv4"
    }

    fn display_name(&self) -> &'static str {
        "IPv4"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_header(buf, parent, ctx.offset).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["tcp", "udp", "icmp", "igmp", "icmpv6"]
    }
}

impl Ipv4Protocol {
    fn parse_header(&self, buf: &[u8], parent: &mut FieldNode, offset: usize) -> LayerResult {
        let mut cur = Cursor::new(buf, offset, "IPv4");
        cur.ensure(MIN_HEADER_LEN)?;

        let version_ihl = cur.read_u8()?;
        let version = version_ihl >> 4;
        let ihl = usize::from(version_ihl & 0x0f);
        if version != 4 {
            return Err(ProtocolError::invalid(
                "IPv4",
                "version",
                format!("expected 4, found {version}"),
            ));
        }
        if ihl < 5 {
            return Err(ProtocolError::invalid(
                "IPv4",
                "header length",
                format!("IHL {ihl} is below the 20-byte minimum"),
            ));
        }
        let header_len = ihl * 4;
        Cursor::new(buf, offset, "IPv4").ensure(header_len)?;

        let header = parent.push(FieldNode::new(
            "Internet Protocol Version 4",
            offset,
            header_len,
        ));
        header.push(FieldNode::leaf(
            "Version/Header Length",
            offset,
            1,
            format_compact!("IPv4, Header Length: {header_len} bytes"),
        ));

        let tos = cur.read_u8()?;
        header.push(FieldNode::leaf(
            "Type of Service",
            offset + 1,
            1,
            format_compact!("0x{tos:02x} (DSCP: {}, ECN: {})", tos >> 2, tos & 0x03),
        ));

        let total_length = cur.read_u16()?;
        header.push(FieldNode::leaf("Total Length", offset + 2, 2, total_length));

        let id = cur.read_u16()?;
        header.push(FieldNode::leaf(
            "Identification",
            offset + 4,
            2,
            format_compact!("0x{id:04x} ({id})"),
        ));

        let flags_frag = cur.read_u16()?;
        let fragment_offset = flags_frag & 0x1fff;
        header.push(FieldNode::leaf(
            "Flags/Fragment Offset",
            offset + 6,
            2,
            format_compact!(
                "Flags: {}, Fragment Offset: {}",
                flag_names(flags_frag),
                fragment_offset
            ),
        ));

        let ttl = cur.read_u8()?;
        header.push(FieldNode::leaf("Time to Live", offset + 8, 1, ttl));

        let protocol = cur.read_u8()?;
        header.push(FieldNode::leaf(
            "Protocol",
            offset + 9,
            1,
            format_compact!("{protocol} ({})", protocol_name(protocol)),
        ));

        let checksum = cur.read_u16()?;
        header.push(FieldNode::leaf(
            "Header Checksum",
            offset + 10,
            2,
            format_compact!("0x{checksum:04x}"),
        ));

        for name in ["Source IP", "Destination IP"] {
            let at = cur.pos();
            let addr = cur.read_bytes(4)?;
            header.push(FieldNode::leaf(
                name,
                at,
                4,
                format_ipv4(addr).unwrap_or_default(),
            ));
        }

        if header_len > MIN_HEADER_LEN {
            let at = cur.pos();
            let options = cur.read_bytes(header_len - MIN_HEADER_LEN)?;
            header.push(FieldNode::leaf(
                "Options",
                at,
                options.len(),
                FieldValue::hex(options),
            ));
        }

        ensure_consumed("IPv4", header_len, cur.pos() - offset)?;

        // Later fragments start mid-payload, not at a transport header
        let layer = if fragment_offset == 0 {
            transport_layer(protocol)
        } else {
            None
        };
        let next = NextLayer::trailing(buf.len(), cur.pos(), u32::from(protocol), layer);
        Ok((header_len, next))
    }
}

fn flag_names(flags_frag: u16) -> &'static str {
    match (flags_frag & 0x4000 != 0, flags_frag & 0x2000 != 0) {
        (true, true) => "DF|MF",
        (true, false) => "DF",
        (false, true) => "MF",
        (false, false) => "None",
    }
}
