//! UDP protocol parser.

use compact_str::format_compact;

use super::context::LayerResult;
use super::cursor::Cursor;
use super::{FieldNode, NextLayer, ParseContext, ParseResult, Protocol};

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;

/// UDP header length.
pub const HEADER_LEN: usize = 8;

/// Well-known UDP services, consulted after the runtime port table.
fn well_known_layer(port: u16) -> Option<&'static str> {
    match port {
        53 => Some("dns"),
        67 | 68 => Some("dhcp"),
        123 => Some("ntp"),
        161 | 162 => Some("snmp"),
        520 => Some("rip"),
        1812 | 1813 => Some("radius"),
        _ => None,
    }
}

/// UDP protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpProtocol;

impl Protocol for UdpProtocol {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn display_name(&self) -> &'static str {
        "UDP"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_datagram(buf, parent, ctx).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["dns", "dhcp", "ntp", "snmp", "rip", "radius"]
    }
}

impl UdpProtocol {
    fn parse_datagram(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> LayerResult {
        let offset = ctx.offset;
        let mut cur = Cursor::new(buf, offset, "UDP");
        cur.ensure(HEADER_LEN)?;

        let header = parent.push(FieldNode::new("UDP Header", offset, HEADER_LEN));

        let src_port = cur.read_u16()?;
        header.push(FieldNode::leaf("Source Port", offset, 2, src_port));
        let dst_port = cur.read_u16()?;
        header.push(FieldNode::leaf("Destination Port", offset + 2, 2, dst_port));
        let length = cur.read_u16()?;
        header.push(FieldNode::leaf("Length", offset + 4, 2, length));
        let checksum = cur.read_u16()?;
        header.push(FieldNode::leaf(
            "Checksum",
            offset + 6,
            2,
            format_compact!("0x{checksum:04x}"),
        ));

        let Some(hint) = NextLayer::trailing(buf.len(), cur.pos(), u32::from(dst_port), None) else {
            return Ok((HEADER_LEN, None));
        };
        if let Some((layer, port)) = ctx.ports.resolve_pair(src_port, dst_port) {
            return Ok((
                HEADER_LEN,
                Some(NextLayer::new(hint.offset, hint.length, u32::from(port), layer)),
            ));
        }
        let known = [src_port, dst_port]
            .into_iter()
            .find_map(|p| well_known_layer(p).map(|layer| (layer, p)));
        let next = match known {
            Some((layer, port)) => NextLayer::new(hint.offset, hint.length, u32::from(port), layer),
            None => hint,
        };
        Ok((HEADER_LEN, Some(next)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::test_utils::{assert_layout, child_names, no_ports, value_of, UdpBuilder};
    use crate::protocol::PortTable;

    fn parse_with(pkt: &[u8], ports: &PortTable) -> (FieldNode, ParseResult) {
        let mut root = FieldNode::root("Transport Protocol", pkt.len(), 0);
        let result = UdpProtocol.parse(pkt, &mut root, &ParseContext::new(0, ports));
        (root, result)
    }

    #[test]
    fn test_parse_udp() {
        let dgram = UdpBuilder::new().ports(12345, 53).payload(vec![0; 12]).build();
        let (root, result) = parse_with(&dgram, &no_ports());

        assert!(result.is_ok());
        assert_eq!(result.consumed, 8);
        assert_layout(&root, dgram.len());
        assert_eq!(
            child_names(&root.children[0]),
            vec!["Source Port", "Destination Port", "Length", "Checksum"]
        );
        assert_eq!(value_of(&root, "Length").as_deref(), Some("20"));

        let next = result.next_layer.unwrap();
        assert_eq!(next.layer.as_deref(), Some("dns"));
        assert_eq!((next.offset, next.length, next.type_code), (8, 12, 53));
    }

    #[test]
    fn test_parse_udp_dhcp() {
        let dgram = UdpBuilder::new().ports(68, 67).payload(vec![1; 4]).build();
        let (_, result) = parse_with(&dgram, &no_ports());
        let next = result.next_layer.unwrap();
        assert_eq!(next.layer.as_deref(), Some("dhcp"));
        // source port is checked first
        assert_eq!(next.type_code, 68);
    }

    #[test]
    fn test_port_table_before_well_known() {
        let ports = PortTable::new();
        ports.insert(5353, "mdns");
        let dgram = UdpBuilder::new().ports(53, 5353).payload(vec![0; 4]).build();
        let (_, result) = parse_with(&dgram, &ports);
        let next = result.next_layer.unwrap();
        assert_eq!(next.layer.as_deref(), Some("mdns"));
        assert_eq!(next.type_code, 5353);
    }

    #[test]
    fn test_unknown_ports_unclassified() {
        let dgram = UdpBuilder::new().ports(40000, 40001).payload(vec![0; 4]).build();
        let (_, result) = parse_with(&dgram, &no_ports());
        let next = result.next_layer.unwrap();
        assert!(next.layer.is_none());
        assert_eq!(next.type_code, 40001);
    }

    #[test]
    fn test_udp_minimal_header() {
        let dgram = UdpBuilder::new().build();
        let (_, result) = parse_with(&dgram, &no_ports());
        assert!(result.is_ok());
        assert!(result.next_layer.is_none());
    }

    #[test]
    fn test_parse_udp_too_short() {
        let (root, result) = parse_with(&[0x00, 0x35, 0x00], &no_ports());
        assert_eq!(result.error.unwrap().kind(), ErrorKind::BufferTooShort);
        assert!(root.children.is_empty());
    }
}
