//! TCP protocol parser.

use compact_str::{format_compact, CompactString};

use super::context::{ensure_consumed, LayerResult};
use super::cursor::Cursor;
use super::{FieldNode, FieldValue, NextLayer, ParseContext, ParseResult, Protocol};
use crate::error::ProtocolError;

/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;

/// Fixed TCP header length (data offset 5).
pub const MIN_HEADER_LEN: usize = 20;

/// TCP flags bit positions.
pub mod flags {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;
    pub const ECE: u16 = 0x040;
    pub const CWR: u16 = 0x080;
    pub const NS: u16 = 0x100;
}

/// TCP option kinds.
pub mod options {
    pub const END_OF_LIST: u8 = 0;
    pub const NOP: u8 = 1;
    pub const MSS: u8 = 2;
    pub const WINDOW_SCALE: u8 = 3;
    pub const SACK_PERMITTED: u8 = 4;
    pub const SACK: u8 = 5;
    pub const TIMESTAMP: u8 = 8;
}

const FLAG_NAMES: [(u16, &str); 9] = [
    (flags::FIN, "FIN"),
    (flags::SYN, "SYN"),
    (flags::RST, "RST"),
    (flags::PSH, "PSH"),
    (flags::ACK, "ACK"),
    (flags::URG, "URG"),
    (flags::ECE, "ECE"),
    (flags::CWR, "CWR"),
    (flags::NS, "NS"),
];

/// Render set flags as `SYN|ACK`, or `None`.
fn format_flags(bits: u16) -> CompactString {
    let mut out = CompactString::default();
    for (bit, name) in FLAG_NAMES {
        if bits & bit != 0 {
            if !out.is_empty() {
                out.push('|');
            }
            out.push_str(name);
        }
    }
    if out.is_empty() {
        out.push_str("None");
    }
    out
}

fn option_name(kind: u8) -> &'static str {
    match kind {
        options::END_OF_LIST => "End of Option List",
        options::NOP => "No-Operation",
        options::MSS => "Maximum Segment Size",
        options::WINDOW_SCALE => "Window Scale",
        options::SACK_PERMITTED => "SACK Permitted",
        options::SACK => "SACK",
        options::TIMESTAMP => "Timestamps",
        _ => "Unknown",
    }
}

/// TCP protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpProtocol;

impl Protocol for TcpProtocol {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn display_name(&self) -> &'static str {
        "TCP"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_segment(buf, parent, ctx).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["bgp"]
    }
}

impl TcpProtocol {
    fn parse_segment(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> LayerResult {
        let offset = ctx.offset;
        let mut cur = Cursor::new(buf, offset, "TCP");
        cur.ensure(MIN_HEADER_LEN)?;

        // data offset is needed up front to size the header node
        let data_offset = buf[offset + 12] >> 4;
        if data_offset < 5 {
            return Err(ProtocolError::invalid(
                "TCP",
                "data offset",
                format!("{data_offset} words is below the 20-byte minimum"),
            ));
        }
        let header_len = usize::from(data_offset) * 4;
        cur.ensure(header_len)?;

        let header = parent.push(FieldNode::new("TCP Header", offset, header_len));

        let src_port = cur.read_u16()?;
        header.push(FieldNode::leaf("Source Port", offset, 2, src_port));
        let dst_port = cur.read_u16()?;
        header.push(FieldNode::leaf("Destination Port", offset + 2, 2, dst_port));

        let seq = cur.read_u32()?;
        header.push(FieldNode::leaf("Sequence Number", offset + 4, 4, seq));
        let ack = cur.read_u32()?;
        header.push(FieldNode::leaf("Acknowledgment Number", offset + 8, 4, ack));

        let offset_flags = cur.read_u16()?;
        header.push(FieldNode::leaf(
            "Data Offset/Flags",
            offset + 12,
            2,
            format_compact!(
                "Data Offset: {header_len} bytes, Flags: {}",
                format_flags(offset_flags & 0x01ff)
            ),
        ));

        let window = cur.read_u16()?;
        header.push(FieldNode::leaf("Window Size", offset + 14, 2, window));

        let checksum = cur.read_u16()?;
        header.push(FieldNode::leaf(
            "Checksum",
            offset + 16,
            2,
            format_compact!("0x{checksum:04x}"),
        ));

        let urgent = cur.read_u16()?;
        header.push(FieldNode::leaf("Urgent Pointer", offset + 18, 2, urgent));

        if header_len > MIN_HEADER_LEN {
            let end = offset + header_len;
            let node = header.push(FieldNode::new(
                "TCP Options",
                cur.pos(),
                header_len - MIN_HEADER_LEN,
            ));
            parse_options(&mut cur, node, offset, end)?;
        }

        ensure_consumed("TCP", header_len, cur.pos() - offset)?;

        let next = NextLayer::trailing(buf.len(), cur.pos(), u32::from(dst_port), None).map(
            |hint| match ctx.ports.resolve_pair(src_port, dst_port) {
                Some((layer, port)) => NextLayer::new(hint.offset, hint.length, u32::from(port), layer),
                None => hint,
            },
        );
        Ok((header_len, next))
    }
}

/// Walk the (kind, length, value) list up to `end`, the absolute header end.
fn parse_options(
    cur: &mut Cursor<'_>,
    node: &mut FieldNode,
    header_start: usize,
    end: usize,
) -> Result<(), ProtocolError> {
    while cur.pos() < end {
        let at = cur.pos();
        let kind = cur.read_u8()?;

        match kind {
            options::END_OF_LIST => {
                // the rest of the header is padding
                let opt = node.push(
                    FieldNode::new(format_compact!("Option (Kind: {kind})"), at, end - at)
                        .with_value(option_name(kind)),
                );
                opt.push(FieldNode::leaf("Kind", at, 1, kind));
                cur.skip(end - cur.pos())?;
                break;
            }
            options::NOP => {
                let opt = node.push(
                    FieldNode::new(format_compact!("Option (Kind: {kind})"), at, 1)
                        .with_value(option_name(kind)),
                );
                opt.push(FieldNode::leaf("Kind", at, 1, kind));
                continue;
            }
            _ => {}
        }

        if cur.pos() >= end {
            return Err(ProtocolError::LengthMismatch {
                protocol: "TCP",
                declared: end - header_start,
                consumed: cur.pos() + 1 - header_start,
            });
        }
        let len = usize::from(cur.read_u8()?);
        if len < 2 {
            return Err(ProtocolError::invalid(
                "TCP",
                "option length",
                format!("option kind {kind} has length {len}"),
            ));
        }
        if at + len > end {
            return Err(ProtocolError::LengthMismatch {
                protocol: "TCP",
                declared: end - header_start,
                consumed: at + len - header_start,
            });
        }
        let value = cur.read_bytes(len - 2)?;

        let opt = node.push(FieldNode::new(
            format_compact!("Option (Kind: {kind})"),
            at,
            len,
        ));
        opt.push(FieldNode::leaf("Kind", at, 1, kind));
        opt.push(FieldNode::leaf("Length", at + 1, 1, len as u64));
        decode_option(opt, kind, at + 2, value);
    }
    Ok(())
}

/// Attach decoded value nodes; malformed known options fall back to hex.
fn decode_option(opt: &mut FieldNode, kind: u8, at: usize, value: &[u8]) {
    let be32 = |b: &[u8]| u32::from_be_bytes([b[0], b[1], b[2], b[3]]);

    match (kind, value.len()) {
        (options::MSS, 2) => {
            let mss = u16::from_be_bytes([value[0], value[1]]);
            opt.value = format_compact!("MSS: {mss}").into();
            opt.push(FieldNode::leaf("Maximum Segment Size", at, 2, mss));
        }
        (options::WINDOW_SCALE, 1) => {
            let shift = value[0];
            opt.value = format_compact!("Window Scale: {shift}").into();
            opt.push(FieldNode::leaf(
                "Shift Count",
                at,
                1,
                format_compact!("{shift} (multiply by {})", 1u64 << shift.min(14)),
            ));
        }
        (options::SACK_PERMITTED, 0) => {
            opt.value = FieldValue::from(option_name(kind));
        }
        (options::SACK, n) if n > 0 && n % 8 == 0 => {
            opt.value = format_compact!("SACK: {} block(s)", n / 8).into();
            for (i, block) in value.chunks_exact(8).enumerate() {
                opt.push(FieldNode::leaf(
                    format_compact!("SACK Block {}", i + 1),
                    at + i * 8,
                    8,
                    format_compact!("{}-{}", be32(&block[..4]), be32(&block[4..])),
                ));
            }
        }
        (options::TIMESTAMP, 8) => {
            let tsval = be32(&value[..4]);
            let tsecr = be32(&value[4..]);
            opt.value = format_compact!("TSval {tsval}, TSecr {tsecr}").into();
            opt.push(FieldNode::leaf("Timestamp Value", at, 4, tsval));
            opt.push(FieldNode::leaf("Timestamp Echo Reply", at + 4, 4, tsecr));
        }
        _ => {
            opt.value = FieldValue::from(option_name(kind));
            if !value.is_empty() {
                opt.push(FieldNode::leaf("Value", at, value.len(), FieldValue::hex(value)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::test_utils::{assert_layout, child_names, no_ports, value_of, TcpBuilder};
    use crate::protocol::PortTable;

    fn parse_with(pkt: &[u8], ports: &PortTable) -> (FieldNode, ParseResult) {
        let mut root = FieldNode::root("Transport Protocol", pkt.len(), 0);
        let result = TcpProtocol.parse(pkt, &mut root, &ParseContext::new(0, ports));
        (root, result)
    }

    fn parse(pkt: &[u8]) -> (FieldNode, ParseResult) {
        parse_with(pkt, &no_ports())
    }

    #[test]
    fn test_format_flags() {
        assert_eq!(format_flags(flags::SYN | flags::ACK).as_str(), "SYN|ACK");
        assert_eq!(format_flags(flags::FIN | flags::PSH | flags::ACK).as_str(), "FIN|PSH|ACK");
        assert_eq!(format_flags(0).as_str(), "None");
        assert_eq!(format_flags(flags::CWR | flags::NS).as_str(), "CWR|NS");
    }

    #[test]
    fn test_parse_tcp_syn_ack() {
        let seg = TcpBuilder::new()
            .ports(80, 8080)
            .flags(0x12)
            .build();
        let (root, result) = parse(&seg);

        assert!(result.is_ok());
        assert_eq!(result.consumed, 20);
        assert!(result.next_layer.is_none());
        assert_layout(&root, seg.len());

        let header = &root.children[0];
        assert_eq!(header.name, "TCP Header");
        assert_eq!(
            child_names(header),
            vec![
                "Source Port",
                "Destination Port",
                "Sequence Number",
                "Acknowledgment Number",
                "Data Offset/Flags",
                "Window Size",
                "Checksum",
                "Urgent Pointer",
            ]
        );
        assert_eq!(value_of(&root, "Source Port").as_deref(), Some("80"));
        assert_eq!(
            value_of(&root, "Data Offset/Flags").as_deref(),
            Some("Data Offset: 20 bytes, Flags: SYN|ACK")
        );
        assert_eq!(value_of(&root, "Checksum").as_deref(), Some("0x0000"));
    }

    #[test]
    fn test_parse_tcp_syn_options() {
        // MSS 1460, SACK permitted, timestamps, NOP, window scale 7
        let seg = TcpBuilder::new()
            .flags(0x02)
            .options(vec![
                0x02, 0x04, 0x05, 0xb4, // MSS
                0x04, 0x02, // SACK permitted
                0x08, 0x0a, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00, 0x00, // TS
                0x01, // NOP
                0x03, 0x03, 0x07, // WS
            ])
            .build();
        let (root, result) = parse(&seg);

        assert!(result.is_ok());
        assert_eq!(result.consumed, 40);
        assert_layout(&root, seg.len());

        let opts = root.find("TCP Options").unwrap();
        assert_eq!((opts.offset, opts.length), (20, 20));
        assert_eq!(
            child_names(opts),
            vec![
                "Option (Kind: 2)",
                "Option (Kind: 4)",
                "Option (Kind: 8)",
                "Option (Kind: 1)",
                "Option (Kind: 3)",
            ]
        );
        assert_eq!(value_of(&root, "Maximum Segment Size").as_deref(), Some("1460"));
        assert_eq!(value_of(&root, "Timestamp Value").as_deref(), Some("100"));
        assert_eq!(
            value_of(&root, "Shift Count").as_deref(),
            Some("7 (multiply by 128)")
        );
        assert_eq!(opts.children[1].value.as_str(), Some("SACK Permitted"));
    }

    #[test]
    fn test_eol_covers_padding() {
        // MSS then EOL; builder pads to 8 option bytes
        let seg = TcpBuilder::new()
            .options(vec![0x02, 0x04, 0x05, 0xb4, 0x00])
            .build();
        let (root, result) = parse(&seg);

        assert!(result.is_ok());
        let opts = root.find("TCP Options").unwrap();
        let eol = &opts.children[1];
        assert_eq!(eol.name, "Option (Kind: 0)");
        assert_eq!((eol.offset, eol.length), (24, 4));
        assert_layout(&root, seg.len());
    }

    #[test]
    fn test_parse_tcp_sack_blocks() {
        let seg = TcpBuilder::new()
            .options(vec![
                0x01, 0x01, // NOP NOP
                0x05, 0x0a, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x20, 0x00,
            ])
            .build();
        let (root, result) = parse(&seg);

        assert!(result.is_ok());
        assert_eq!(value_of(&root, "SACK Block 1").as_deref(), Some("4096-8192"));
        let block = root.find("SACK Block 1").unwrap();
        assert_eq!((block.offset, block.length), (24, 8));
    }

    #[test]
    fn test_unknown_option_is_hex() {
        let seg = TcpBuilder::new()
            .options(vec![0x1e, 0x06, 0xde, 0xad, 0xbe, 0xef])
            .build();
        let (root, result) = parse(&seg);
        assert!(result.is_ok());
        assert_eq!(value_of(&root, "Value").as_deref(), Some("deadbeef"));
    }

    #[test]
    fn test_option_length_below_two() {
        let seg = TcpBuilder::new().options(vec![0x02, 0x01, 0x00, 0x00]).build();
        let (root, result) = parse(&seg);
        let err = result.error.unwrap();
        assert_eq!(err.kind(), ErrorKind::StructuralInconsistency);
        assert!(err.to_string().contains("option length"));
        // fixed fields are kept
        assert!(root.find("Urgent Pointer").is_some());
    }

    #[test]
    fn test_option_overruns_header() {
        // Timestamp claims 10 bytes, only 4 option bytes in the header
        let seg = TcpBuilder::new().options(vec![0x08, 0x0a, 0x00, 0x00]).build();
        let (_, result) = parse(&seg);
        assert_eq!(
            result.error,
            Some(ProtocolError::LengthMismatch {
                protocol: "TCP",
                declared: 24,
                consumed: 30
            })
        );
    }

    #[test]
    fn test_truncated_options() {
        // data offset 8 (32 bytes) but only 24 bytes present
        let seg = TcpBuilder::new().data_offset(8).options(vec![0x01; 4]).build();
        assert_eq!(seg.len(), 24);
        let (root, result) = parse(&seg);

        let err = result.error.unwrap();
        assert_eq!(err.to_string(), "TCP: packet too short (need 32 bytes, have 24)");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_data_offset_below_minimum() {
        let seg = TcpBuilder::new().data_offset(4).build();
        let (root, result) = parse(&seg);
        assert_eq!(result.error.unwrap().kind(), ErrorKind::StructuralInconsistency);
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_parse_tcp_too_short() {
        let (root, result) = parse(&[0x00, 0x50, 0x1f, 0x90]);
        assert_eq!(result.error.unwrap().kind(), ErrorKind::BufferTooShort);
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_payload_resolved_by_port() {
        let ports = PortTable::new();
        ports.insert(179, "bgp");
        let seg = TcpBuilder::new().ports(40000, 179).payload(vec![0xff; 19]).build();
        let (_, result) = parse_with(&seg, &ports);

        let next = result.next_layer.unwrap();
        assert_eq!(next.layer.as_deref(), Some("bgp"));
        assert_eq!((next.offset, next.length, next.type_code), (20, 19, 179));
    }

    #[test]
    fn test_source_port_wins() {
        let ports = PortTable::new();
        ports.insert(179, "bgp");
        ports.insert(323, "rpki");
        let seg = TcpBuilder::new().ports(323, 179).payload(vec![0; 4]).build();
        let (_, result) = parse_with(&seg, &ports);

        let next = result.next_layer.unwrap();
        assert_eq!(next.layer.as_deref(), Some("rpki"));
        assert_eq!(next.type_code, 323);
    }

    #[test]
    fn test_unbound_ports_unclassified() {
        let seg = TcpBuilder::new().ports(40000, 8080).payload(vec![1, 2, 3]).build();
        let (_, result) = parse(&seg);
        let next = result.next_layer.unwrap();
        assert!(next.layer.is_none());
        assert_eq!(next.type_code, 8080);
    }
}
