//! IPv6 protocol parser.
//!
//! Only the fixed 40-byte header is decoded. Extension headers are left to
//! the next-header classification, which treats them as unclassified.

use compact_str::format_compact;

use super::context::LayerResult;
use super::cursor::Cursor;
use super::ipv4::{protocol_name, transport_layer};
use super::{FieldNode, NextLayer, ParseContext, ParseResult, Protocol};
use crate::error::ProtocolError;
use crate::format::format_ipv6;

/// Fixed IPv6 header length.
pub const HEADER_LEN: usize = 40;

/// Traffic class spans the low nibble of byte 0 and the high nibble of byte 1.
#[inline]
fn traffic_class(b0: u8, b1: u8) -> u8 {
    ((b0 & 0x0f) << 4) | (b1 >> 4)
}

/// Flow label is the low nibble of byte 1 followed by bytes 2 and 3.
#[inline]
fn flow_label(b1: u8, b2: u8, b3: u8) -> u32 {
    (u32::from(b1 & 0x0f) << 16) | (u32::from(b2) << 8) | u32::from(b3)
}

/// IPv6 protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Protocol;

impl Protocol for Ipv6Protocol {
    fn name(&self) -> &'static str {
        "ipv6"
    }

    fn display_name(&self) -> &'static str {
        "IPv6"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_header(buf, parent, ctx.offset).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["tcp", "udp", "icmpv6"]
    }
}

impl Ipv6Protocol {
    fn parse_header(&self, buf: &[u8], parent: &mut FieldNode, offset: usize) -> LayerResult {
        let mut cur = Cursor::new(buf, offset, "IPv6");
        cur.ensure(HEADER_LEN)?;

        let first = cur.read_bytes(4)?;
        let (b0, b1, b2, b3) = (first[0], first[1], first[2], first[3]);
        let version = b0 >> 4;
        if version != 6 {
            return Err(ProtocolError::invalid(
                "IPv6",
                "version",
                format!("expected 6, found {version}"),
            ));
        }

        let header = parent.push(FieldNode::new(
            "Internet Protocol Version 6",
            offset,
            HEADER_LEN,
        ));
        // version, traffic class and flow label share the first 32-bit word
        let word = header.push(FieldNode::new("Version/Traffic Class/Flow Label", offset, 4));
        word.value = format_compact!("0x{:08x}", u32::from_be_bytes([b0, b1, b2, b3])).into();
        word.push(FieldNode::leaf("Version", offset, 1, u64::from(version)).with_bits(0, 4));
        word.push(
            FieldNode::leaf(
                "Traffic Class",
                offset,
                2,
                format_compact!("0x{:02x}", traffic_class(b0, b1)),
            )
            .with_bits(4, 8),
        );
        word.push(
            FieldNode::leaf(
                "Flow Label",
                offset + 1,
                3,
                format_compact!("0x{:05x}", flow_label(b1, b2, b3)),
            )
            .with_bits(4, 20),
        );

        let payload_length = cur.read_u16()?;
        header.push(FieldNode::leaf("Payload Length", offset + 4, 2, payload_length));

        let next_header = cur.read_u8()?;
        header.push(FieldNode::leaf(
            "Next Header",
            offset + 6,
            1,
            format_compact!("{next_header} ({})", protocol_name(next_header)),
        ));

        let hop_limit = cur.read_u8()?;
        header.push(FieldNode::leaf("Hop Limit", offset + 7, 1, hop_limit));

        for name in ["Source IP", "Destination IP"] {
            let at = cur.pos();
            let addr = cur.read_bytes(16)?;
            header.push(FieldNode::leaf(
                name,
                at,
                16,
                format_ipv6(addr).unwrap_or_default(),
            ));
        }

        let next = NextLayer::trailing(
            buf.len(),
            cur.pos(),
            u32::from(next_header),
            transport_layer(next_header),
        );
        Ok((HEADER_LEN, next))
    }
}
