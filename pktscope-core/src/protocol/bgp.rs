//! BGP protocol parser.
//!
//! Parses BGP-4 messages (RFC 4271) carried over TCP: OPEN with optional
//! parameters and capabilities (RFC 5492), UPDATE, NOTIFICATION, KEEPALIVE
//! and ROUTE-REFRESH (RFC 2918, RFC 7313). A segment holding several messages
//! hints back at `bgp` for each message after the first.

use compact_str::{format_compact, CompactString};

use super::context::{ensure_consumed, LayerResult};
use super::cursor::Cursor;
use super::{FieldNode, FieldValue, NextLayer, ParseContext, ParseResult, Protocol};
use crate::error::ProtocolError;
use crate::format::{format_ipv4, format_prefix_v4};

/// BGP well-known TCP port.
pub const BGP_PORT: u16 = 179;

/// Marker, length and type.
pub const HEADER_LEN: usize = 19;

/// Largest message allowed without the extended message capability.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// BGP message types.
pub mod message_type {
    pub const OPEN: u8 = 1;
    pub const UPDATE: u8 = 2;
    pub const NOTIFICATION: u8 = 3;
    pub const KEEPALIVE: u8 = 4;
    pub const ROUTE_REFRESH: u8 = 5;
}

/// BGP path attribute type codes.
pub mod path_attr_type {
    pub const ORIGIN: u8 = 1;
    pub const AS_PATH: u8 = 2;
    pub const NEXT_HOP: u8 = 3;
    pub const MULTI_EXIT_DISC: u8 = 4;
    pub const LOCAL_PREF: u8 = 5;
    pub const ATOMIC_AGGREGATE: u8 = 6;
    pub const AGGREGATOR: u8 = 7;
    pub const COMMUNITIES: u8 = 8;
    pub const ORIGINATOR_ID: u8 = 9;
    pub const CLUSTER_LIST: u8 = 10;
    pub const MP_REACH_NLRI: u8 = 14;
    pub const MP_UNREACH_NLRI: u8 = 15;
    pub const EXTENDED_COMMUNITIES: u8 = 16;
    pub const AS4_PATH: u8 = 17;
    pub const AS4_AGGREGATOR: u8 = 18;
    pub const LARGE_COMMUNITIES: u8 = 32;
    pub const OTC: u8 = 35;
}

/// Path attribute flag bits.
pub mod path_attr_flags {
    pub const OPTIONAL: u8 = 0x80;
    pub const TRANSITIVE: u8 = 0x40;
    pub const PARTIAL: u8 = 0x20;
    pub const EXTENDED_LENGTH: u8 = 0x10;
}

/// BGP ORIGIN attribute values.
pub mod origin_type {
    pub const IGP: u8 = 0;
    pub const EGP: u8 = 1;
    pub const INCOMPLETE: u8 = 2;
}

/// AS_PATH segment types.
pub mod as_path_segment_type {
    pub const AS_SET: u8 = 1;
    pub const AS_SEQUENCE: u8 = 2;
}

/// BGP NOTIFICATION error codes.
pub mod error_code {
    pub const MESSAGE_HEADER_ERROR: u8 = 1;
    pub const OPEN_MESSAGE_ERROR: u8 = 2;
    pub const UPDATE_MESSAGE_ERROR: u8 = 3;
    pub const HOLD_TIMER_EXPIRED: u8 = 4;
    pub const FSM_ERROR: u8 = 5;
    pub const CEASE: u8 = 6;
    pub const ROUTE_REFRESH_ERROR: u8 = 7;
}

/// OPEN optional parameter types.
pub mod param_type {
    pub const AUTHENTICATION: u8 = 1;
    pub const CAPABILITIES: u8 = 2;
    pub const EXTENDED_LENGTH: u8 = 255;
}

/// BGP capability codes.
pub mod capability_code {
    pub const MULTIPROTOCOL: u8 = 1;
    pub const ROUTE_REFRESH: u8 = 2;
    pub const EXTENDED_NEXT_HOP: u8 = 5;
    pub const EXTENDED_MESSAGE: u8 = 6;
    pub const BGP_ROLE: u8 = 9;
    pub const GRACEFUL_RESTART: u8 = 64;
    pub const FOUR_OCTET_AS: u8 = 65;
    pub const ADD_PATH: u8 = 69;
    pub const ENHANCED_ROUTE_REFRESH: u8 = 70;
}

/// BGP Marker: 16 bytes of 0xFF.
const BGP_MARKER: [u8; 16] = [0xFF; 16];

/// Get the name of a BGP message type.
fn message_type_name(msg_type: u8) -> &'static str {
    match msg_type {
        message_type::OPEN => "OPEN",
        message_type::UPDATE => "UPDATE",
        message_type::NOTIFICATION => "NOTIFICATION",
        message_type::KEEPALIVE => "KEEPALIVE",
        message_type::ROUTE_REFRESH => "ROUTE-REFRESH",
        _ => "UNKNOWN",
    }
}

/// Get the name of a BGP ORIGIN value.
fn origin_name(origin: u8) -> &'static str {
    match origin {
        origin_type::IGP => "IGP",
        origin_type::EGP => "EGP",
        origin_type::INCOMPLETE => "INCOMPLETE",
        _ => "UNKNOWN",
    }
}

/// Get the name of a BGP error code.
fn error_code_name(code: u8) -> &'static str {
    match code {
        error_code::MESSAGE_HEADER_ERROR => "Message Header Error",
        error_code::OPEN_MESSAGE_ERROR => "OPEN Message Error",
        error_code::UPDATE_MESSAGE_ERROR => "UPDATE Message Error",
        error_code::HOLD_TIMER_EXPIRED => "Hold Timer Expired",
        error_code::FSM_ERROR => "Finite State Machine Error",
        error_code::CEASE => "Cease",
        error_code::ROUTE_REFRESH_ERROR => "ROUTE-REFRESH Message Error",
        _ => "Unknown",
    }
}

/// Subcode meanings depend on the error code.
fn error_subcode_name(code: u8, subcode: u8) -> &'static str {
    if subcode == 0 {
        return "Unspecific";
    }
    match (code, subcode) {
        (error_code::MESSAGE_HEADER_ERROR, 1) => "Connection Not Synchronized",
        (error_code::MESSAGE_HEADER_ERROR, 2) => "Bad Message Length",
        (error_code::MESSAGE_HEADER_ERROR, 3) => "Bad Message Type",

        (error_code::OPEN_MESSAGE_ERROR, 1) => "Unsupported Version Number",
        (error_code::OPEN_MESSAGE_ERROR, 2) => "Bad Peer AS",
        (error_code::OPEN_MESSAGE_ERROR, 3) => "Bad BGP Identifier",
        (error_code::OPEN_MESSAGE_ERROR, 4) => "Unsupported Optional Parameter",
        (error_code::OPEN_MESSAGE_ERROR, 5) => "Authentication Failure",
        (error_code::OPEN_MESSAGE_ERROR, 6) => "Unacceptable Hold Time",
        (error_code::OPEN_MESSAGE_ERROR, 7) => "Unsupported Capability",
        (error_code::OPEN_MESSAGE_ERROR, 11) => "Role Mismatch",

        (error_code::UPDATE_MESSAGE_ERROR, 1) => "Malformed Attribute List",
        (error_code::UPDATE_MESSAGE_ERROR, 2) => "Unrecognized Well-known Attribute",
        (error_code::UPDATE_MESSAGE_ERROR, 3) => "Missing Well-known Attribute",
        (error_code::UPDATE_MESSAGE_ERROR, 4) => "Attribute Flags Error",
        (error_code::UPDATE_MESSAGE_ERROR, 5) => "Attribute Length Error",
        (error_code::UPDATE_MESSAGE_ERROR, 6) => "Invalid ORIGIN Attribute",
        (error_code::UPDATE_MESSAGE_ERROR, 7) => "AS Routing Loop",
        (error_code::UPDATE_MESSAGE_ERROR, 8) => "Invalid NEXT_HOP Attribute",
        (error_code::UPDATE_MESSAGE_ERROR, 9) => "Optional Attribute Error",
        (error_code::UPDATE_MESSAGE_ERROR, 10) => "Invalid Network Field",
        (error_code::UPDATE_MESSAGE_ERROR, 11) => "Malformed AS_PATH",

        (error_code::FSM_ERROR, 1) => "Unexpected Message in OpenSent State",
        (error_code::FSM_ERROR, 2) => "Unexpected Message in OpenConfirm State",
        (error_code::FSM_ERROR, 3) => "Unexpected Message in Established State",

        (error_code::CEASE, 1) => "Maximum Number of Prefixes Reached",
        (error_code::CEASE, 2) => "Administrative Shutdown",
        (error_code::CEASE, 3) => "Peer De-configured",
        (error_code::CEASE, 4) => "Administrative Reset",
        (error_code::CEASE, 5) => "Connection Rejected",
        (error_code::CEASE, 6) => "Other Configuration Change",
        (error_code::CEASE, 7) => "Connection Collision Resolution",
        (error_code::CEASE, 8) => "Out of Resources",
        (error_code::CEASE, 9) => "Hard Reset",

        (error_code::ROUTE_REFRESH_ERROR, 1) => "Invalid Message Length",
        _ => "Unknown",
    }
}

/// Get the name of a path attribute type.
fn path_attr_type_name(type_code: u8) -> &'static str {
    match type_code {
        path_attr_type::ORIGIN => "ORIGIN",
        path_attr_type::AS_PATH => "AS_PATH",
        path_attr_type::NEXT_HOP => "NEXT_HOP",
        path_attr_type::MULTI_EXIT_DISC => "MULTI_EXIT_DISC",
        path_attr_type::LOCAL_PREF => "LOCAL_PREF",
        path_attr_type::ATOMIC_AGGREGATE => "ATOMIC_AGGREGATE",
        path_attr_type::AGGREGATOR => "AGGREGATOR",
        path_attr_type::COMMUNITIES => "COMMUNITIES",
        path_attr_type::ORIGINATOR_ID => "ORIGINATOR_ID",
        path_attr_type::CLUSTER_LIST => "CLUSTER_LIST",
        path_attr_type::MP_REACH_NLRI => "MP_REACH_NLRI",
        path_attr_type::MP_UNREACH_NLRI => "MP_UNREACH_NLRI",
        path_attr_type::EXTENDED_COMMUNITIES => "EXTENDED_COMMUNITIES",
        path_attr_type::AS4_PATH => "AS4_PATH",
        path_attr_type::AS4_AGGREGATOR => "AS4_AGGREGATOR",
        path_attr_type::LARGE_COMMUNITIES => "LARGE_COMMUNITIES",
        path_attr_type::OTC => "OTC",
        _ => "UNKNOWN",
    }
}

fn param_type_name(ptype: u8) -> &'static str {
    match ptype {
        param_type::AUTHENTICATION => "Authentication",
        param_type::CAPABILITIES => "Capabilities",
        param_type::EXTENDED_LENGTH => "Extended Length",
        _ => "Unknown",
    }
}

fn capability_name(code: u8) -> &'static str {
    match code {
        capability_code::MULTIPROTOCOL => "Multiprotocol Extensions",
        capability_code::ROUTE_REFRESH => "Route Refresh",
        capability_code::EXTENDED_NEXT_HOP => "Extended Next Hop Encoding",
        capability_code::EXTENDED_MESSAGE => "Extended Message",
        capability_code::BGP_ROLE => "BGP Role",
        capability_code::GRACEFUL_RESTART => "Graceful Restart",
        capability_code::FOUR_OCTET_AS => "4-octet AS Number",
        capability_code::ADD_PATH => "ADD-PATH",
        capability_code::ENHANCED_ROUTE_REFRESH => "Enhanced Route Refresh",
        128 => "Route Refresh (Cisco)",
        _ => "Unknown",
    }
}

fn afi_name(afi: u16) -> &'static str {
    match afi {
        1 => "IPv4",
        2 => "IPv6",
        25 => "L2VPN",
        _ => "Unknown",
    }
}

fn safi_name(safi: u8) -> &'static str {
    match safi {
        1 => "Unicast",
        2 => "Multicast",
        4 => "MPLS Labels",
        70 => "EVPN",
        128 => "MPLS-labeled VPN",
        _ => "Unknown",
    }
}

fn role_name(role: u8) -> &'static str {
    match role {
        0 => "Provider",
        1 => "Route Server",
        2 => "Route Server Client",
        3 => "Customer",
        4 => "Lateral Peer",
        _ => "Unknown",
    }
}

/// ROUTE-REFRESH message subtypes (RFC 7313), carried in the reserved byte.
fn refresh_subtype_name(subtype: u8) -> &'static str {
    match subtype {
        0 => "Normal Request",
        1 => "BoRR",
        2 => "EoRR",
        _ => "Reserved",
    }
}

fn format_attr_flags(flags: u8) -> CompactString {
    let names = [
        (path_attr_flags::OPTIONAL, "OPTIONAL"),
        (path_attr_flags::TRANSITIVE, "TRANSITIVE"),
        (path_attr_flags::PARTIAL, "PARTIAL"),
        (path_attr_flags::EXTENDED_LENGTH, "EXTENDED_LENGTH"),
    ];
    let set: Vec<&str> = names
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if set.is_empty() {
        format_compact!("0x{flags:02x} (None)")
    } else {
        format_compact!("0x{flags:02x} ({})", set.join("|"))
    }
}

#[inline]
fn be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// BGP protocol parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgpProtocol;

impl Protocol for BgpProtocol {
    fn name(&self) -> &'static str {
        "bgp"
    }

    fn display_name(&self) -> &'static str {
        "BGP"
    }

    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        self.parse_message(buf, parent, ctx).into()
    }

    fn child_layers(&self) -> &'static [&'static str] {
        &["bgp"]
    }
}

impl BgpProtocol {
    /// Parse one message at `ctx.offset`.
    ///
    /// The header nodes are attached before the marker and length are
    /// validated, so a malformed message still shows what was read.
    fn parse_message(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> LayerResult {
        let offset = ctx.offset;
        let mut cur = Cursor::new(buf, offset, "BGP");
        cur.ensure(HEADER_LEN)?;

        let marker = cur.read_bytes(16)?;
        let length = cur.read_u16()?;
        let msg_type = cur.read_u8()?;

        let packet = parent.push(FieldNode::new("BGP Packet", offset, HEADER_LEN));
        let marker_ok = marker == BGP_MARKER;
        packet.push(FieldNode::leaf(
            "Marker",
            offset,
            16,
            if marker_ok {
                FieldValue::from("All ones (0xFF)")
            } else {
                FieldValue::hex(marker)
            },
        ));
        packet.push(FieldNode::leaf("Length", offset + 16, 2, length));
        packet.push(FieldNode::leaf(
            "Type",
            offset + 18,
            1,
            format_compact!("{msg_type} ({})", message_type_name(msg_type)),
        ));

        if !marker_ok {
            return Err(ProtocolError::InvalidFixedValue {
                protocol: "BGP",
                field: "marker",
            });
        }

        let length = usize::from(length);
        if !(HEADER_LEN..=MAX_MESSAGE_LEN).contains(&length) {
            return Err(ProtocolError::invalid(
                "BGP",
                "length",
                format!("{length} is outside {HEADER_LEN}..={MAX_MESSAGE_LEN}"),
            ));
        }
        let end = offset + length;
        if end > buf.len() {
            // incomplete packet
            return Err(ProtocolError::too_short("BGP", end, buf.len()));
        }
        packet.length = length;

        // body reads may not run past the declared message end
        let mut body = Cursor::new(&buf[..end], cur.pos(), "BGP");
        match msg_type {
            message_type::OPEN => parse_open(&mut body, packet, end)?,
            message_type::UPDATE => parse_update(&mut body, packet, end)?,
            message_type::NOTIFICATION => parse_notification(&mut body, packet, end)?,
            message_type::KEEPALIVE => {
                if length != HEADER_LEN {
                    return Err(ProtocolError::invalid(
                        "BGP",
                        "length",
                        format!("KEEPALIVE must be {HEADER_LEN} bytes, got {length}"),
                    ));
                }
            }
            message_type::ROUTE_REFRESH => parse_route_refresh(&mut body, packet, end)?,
            _ => {
                return Err(ProtocolError::invalid(
                    "BGP",
                    "message type",
                    format!("Unknown BGP message type: {msg_type}"),
                ))
            }
        }
        ensure_consumed("BGP", length, body.pos() - offset)?;

        let layer = starts_complete_message(&buf[end..]).then_some("bgp");
        let next = NextLayer::trailing(buf.len(), end, ctx.type_code, layer);
        Ok((length, next))
    }
}

/// Whether `rest` opens with a whole message: the marker plus a declared
/// length that fits. Anything else (an FCS, or a message continued in the
/// next segment) is left raw.
fn starts_complete_message(rest: &[u8]) -> bool {
    if rest.len() < HEADER_LEN || rest[..16] != BGP_MARKER {
        return false;
    }
    let length = usize::from(u16::from_be_bytes([rest[16], rest[17]]));
    length <= rest.len()
}

/// Parse BGP OPEN message.
///
/// OPEN Message Format:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+
/// |    Version    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     My Autonomous System      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           Hold Time           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         BGP Identifier                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Opt Parm Len  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |             Optional Parameters (variable)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
fn parse_open(cur: &mut Cursor<'_>, packet: &mut FieldNode, end: usize) -> Result<(), ProtocolError> {
    let at = cur.pos();
    let version = cur.read_u8()?;
    packet.push(FieldNode::leaf("Version", at, 1, version));

    let my_as = cur.read_u16()?;
    packet.push(FieldNode::leaf("My AS", at + 1, 2, my_as));

    let hold_time = cur.read_u16()?;
    packet.push(FieldNode::leaf("Hold Time", at + 3, 2, hold_time));

    let id = cur.read_bytes(4)?;
    packet.push(FieldNode::leaf(
        "BGP Identifier",
        at + 5,
        4,
        format_ipv4(id).unwrap_or_default(),
    ));

    let opt_len = usize::from(cur.read_u8()?);
    packet.push(FieldNode::leaf("Optional Parameters Length", at + 9, 1, opt_len as u64));

    let params_start = cur.pos();
    if params_start + opt_len != end {
        return Err(ProtocolError::LengthMismatch {
            protocol: "BGP",
            declared: end - params_start,
            consumed: opt_len,
        });
    }
    if opt_len == 0 {
        return Ok(());
    }

    let params = packet.push(FieldNode::new("Optional Parameters", params_start, opt_len));
    while cur.pos() < end {
        let at = cur.pos();
        let ptype = cur.read_u8()?;
        let plen = usize::from(cur.read_u8()?);
        if at + 2 + plen > end {
            return Err(ProtocolError::invalid(
                "BGP",
                "optional parameter length",
                format!("parameter type {ptype} overruns the optional parameters"),
            ));
        }

        let param = params.push(FieldNode::new(
            format_compact!("Parameter (Type: {ptype})"),
            at,
            2 + plen,
        ));
        param.push(FieldNode::leaf(
            "Parameter Type",
            at,
            1,
            format_compact!("{ptype} ({})", param_type_name(ptype)),
        ));
        param.push(FieldNode::leaf("Parameter Length", at + 1, 1, plen as u64));

        if ptype == param_type::CAPABILITIES {
            let caps = param.push(FieldNode::new("Capabilities", at + 2, plen));
            parse_capabilities(cur, caps, at + 2 + plen)?;
        } else if plen > 0 {
            let value = cur.read_bytes(plen)?;
            param.push(FieldNode::leaf(
                "Parameter Value",
                at + 2,
                plen,
                FieldValue::hex(value),
            ));
        }
    }
    Ok(())
}

fn parse_capabilities(cur: &mut Cursor<'_>, caps: &mut FieldNode, end: usize) -> Result<(), ProtocolError> {
    while cur.pos() < end {
        let at = cur.pos();
        let code = cur.read_u8()?;
        let clen = usize::from(cur.read_u8()?);
        if at + 2 + clen > end {
            return Err(ProtocolError::invalid(
                "BGP",
                "capability length",
                format!("capability {code} overruns its parameter"),
            ));
        }
        let value = cur.read_bytes(clen)?;
        let name = capability_name(code);

        let cap = caps.push(FieldNode::new(
            format_compact!("Capability (Code: {code} - {name})"),
            at,
            2 + clen,
        ));
        cap.push(FieldNode::leaf("Code", at, 1, format_compact!("{code} ({name})")));
        cap.push(FieldNode::leaf("Length", at + 1, 1, clen as u64));

        let v = at + 2;
        match code {
            capability_code::MULTIPROTOCOL if clen >= 4 => {
                let afi = u16::from_be_bytes([value[0], value[1]]);
                cap.push(FieldNode::leaf(
                    "AFI",
                    v,
                    2,
                    format_compact!("{afi} ({})", afi_name(afi)),
                ));
                cap.push(FieldNode::leaf("Reserved", v + 2, 1, value[2]));
                cap.push(FieldNode::leaf(
                    "SAFI",
                    v + 3,
                    1,
                    format_compact!("{} ({})", value[3], safi_name(value[3])),
                ));
            }
            capability_code::FOUR_OCTET_AS if clen >= 4 => {
                cap.push(FieldNode::leaf("4-Octet AS Number", v, 4, be32(value)));
            }
            capability_code::BGP_ROLE if clen >= 1 => {
                cap.push(FieldNode::leaf(
                    "Role",
                    v,
                    1,
                    format_compact!("{} ({})", value[0], role_name(value[0])),
                ));
            }
            _ if clen > 0 => {
                cap.push(FieldNode::leaf("Value", v, clen, FieldValue::hex(value)));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Parse BGP UPDATE message.
///
/// UPDATE Message Format:
/// ```text
/// +-----------------------------------------------------+
/// |   Withdrawn Routes Length (2 octets)                |
/// +-----------------------------------------------------+
/// |   Withdrawn Routes (variable)                       |
/// +-----------------------------------------------------+
/// |   Total Path Attribute Length (2 octets)            |
/// +-----------------------------------------------------+
/// |   Path Attributes (variable)                        |
/// +-----------------------------------------------------+
/// |   Network Layer Reachability Information (variable) |
/// +-----------------------------------------------------+
/// ```
fn parse_update(cur: &mut Cursor<'_>, packet: &mut FieldNode, end: usize) -> Result<(), ProtocolError> {
    let at = cur.pos();
    let withdrawn_len = usize::from(cur.read_u16()?);
    packet.push(FieldNode::leaf("Withdrawn Routes Length", at, 2, withdrawn_len as u64));
    let withdrawn_end = cur.pos() + withdrawn_len;
    if withdrawn_end > end {
        return Err(ProtocolError::invalid(
            "BGP",
            "withdrawn routes length",
            format!("{withdrawn_len} bytes overrun the message"),
        ));
    }
    if withdrawn_len > 0 {
        let routes = packet.push(FieldNode::new("Withdrawn Routes", cur.pos(), withdrawn_len));
        parse_prefixes(cur, routes, withdrawn_end)?;
    }

    let at = cur.pos();
    let attrs_len = usize::from(cur.read_u16()?);
    packet.push(FieldNode::leaf("Path Attributes Length", at, 2, attrs_len as u64));
    let attrs_end = cur.pos() + attrs_len;
    if attrs_end > end {
        return Err(ProtocolError::invalid(
            "BGP",
            "path attributes length",
            format!("{attrs_len} bytes overrun the message"),
        ));
    }
    if attrs_len > 0 {
        let attrs = packet.push(FieldNode::new("Path Attributes", cur.pos(), attrs_len));
        parse_path_attributes(cur, attrs, attrs_end)?;
    }

    // NLRI takes whatever is left
    if cur.pos() < end {
        let nlri = packet.push(FieldNode::new("NLRI", cur.pos(), end - cur.pos()));
        parse_prefixes(cur, nlri, end)?;
    }
    Ok(())
}

/// Parse `(length, prefix)` entries up to `end`, one "Route i" node each.
/// The prefix field holds `ceil(length / 8)` bytes.
fn parse_prefixes(cur: &mut Cursor<'_>, node: &mut FieldNode, end: usize) -> Result<(), ProtocolError> {
    let mut index = 0;
    while cur.pos() < end {
        let at = cur.pos();
        let bits = cur.read_u8()?;
        if bits > 32 {
            return Err(ProtocolError::invalid(
                "BGP",
                "prefix length",
                format!("{bits} exceeds 32 bits"),
            ));
        }
        let nbytes = usize::from(bits).div_ceil(8);
        if at + 1 + nbytes > end {
            return Err(ProtocolError::invalid(
                "BGP",
                "prefix",
                format!("{bits}-bit prefix overruns its section"),
            ));
        }
        let bytes = cur.read_bytes(nbytes)?;
        let prefix = format_prefix_v4(bytes, bits);

        index += 1;
        let route = node.push(
            FieldNode::new(format_compact!("Route {index}"), at, 1 + nbytes)
                .with_value(format_compact!("{bits} bits: {prefix}")),
        );
        route.push(FieldNode::leaf("Prefix Length", at, 1, bits));
        if nbytes > 0 {
            route.push(FieldNode::leaf("Prefix", at + 1, nbytes, prefix));
        }
    }
    Ok(())
}

fn parse_path_attributes(
    cur: &mut Cursor<'_>,
    attrs: &mut FieldNode,
    end: usize,
) -> Result<(), ProtocolError> {
    while cur.pos() < end {
        let at = cur.pos();
        let flags = cur.read_u8()?;
        let type_code = cur.read_u8()?;
        let extended = flags & path_attr_flags::EXTENDED_LENGTH != 0;
        let (attr_len, len_size) = if extended {
            (usize::from(cur.read_u16()?), 2)
        } else {
            (usize::from(cur.read_u8()?), 1)
        };
        let header_len = 2 + len_size;
        if at + header_len + attr_len > end {
            return Err(ProtocolError::invalid(
                "BGP",
                "path attribute length",
                format!("attribute type {type_code} overruns the path attributes"),
            ));
        }
        let value = cur.read_bytes(attr_len)?;
        let name = path_attr_type_name(type_code);

        let mut attr = FieldNode::new(
            format_compact!("Attribute (Type: {type_code} - {name})"),
            at,
            header_len + attr_len,
        );
        if let Some(summary) = attribute_summary(type_code, value) {
            attr.value = summary.into();
        }
        let attr = attrs.push(attr);
        attr.push(FieldNode::leaf("Flags", at, 1, format_attr_flags(flags)));
        attr.push(FieldNode::leaf(
            "Type",
            at + 1,
            1,
            format_compact!("{type_code} ({name})"),
        ));
        attr.push(FieldNode::leaf("Length", at + 2, len_size, attr_len as u64));
        if attr_len > 0 {
            attr.push(FieldNode::leaf(
                "Value",
                at + header_len,
                attr_len,
                FieldValue::hex(value),
            ));
        }
    }
    Ok(())
}

/// Human-readable rendering of well-known attribute values.
fn attribute_summary(type_code: u8, data: &[u8]) -> Option<CompactString> {
    match type_code {
        path_attr_type::ORIGIN if data.len() == 1 => Some(origin_name(data[0]).into()),
        path_attr_type::AS_PATH | path_attr_type::AS4_PATH => Some(format_as_path(data)),
        path_attr_type::NEXT_HOP | path_attr_type::ORIGINATOR_ID => {
            format_ipv4(data).map(CompactString::from)
        }
        path_attr_type::MULTI_EXIT_DISC | path_attr_type::LOCAL_PREF | path_attr_type::OTC
            if data.len() == 4 =>
        {
            Some(format_compact!("{}", be32(data)))
        }
        path_attr_type::AGGREGATOR => {
            // 2-byte AS + IPv4, or 4-byte AS + IPv4
            let (asn, ip) = match data.len() {
                6 => (u32::from(u16::from_be_bytes([data[0], data[1]])), &data[2..]),
                8 => (be32(data), &data[4..]),
                _ => return None,
            };
            Some(format_compact!("AS {asn}, {}", format_ipv4(ip)?))
        }
        path_attr_type::COMMUNITIES if !data.is_empty() && data.len() % 4 == 0 => {
            let parts: Vec<String> = data
                .chunks_exact(4)
                .map(|c| {
                    format!(
                        "{}:{}",
                        u16::from_be_bytes([c[0], c[1]]),
                        u16::from_be_bytes([c[2], c[3]])
                    )
                })
                .collect();
            Some(parts.join(" ").into())
        }
        _ => None,
    }
}

/// Render AS_PATH segments, e.g. `65001 65002 {65003,65004}`.
///
/// The ASN width is not signalled in the attribute. 4-byte ASNs are assumed
/// when the segments tile the attribute exactly at that width, 2-byte otherwise.
fn format_as_path(data: &[u8]) -> CompactString {
    let as_size = if segments_fit(data, 4) { 4 } else { 2 };
    let mut segments = Vec::with_capacity(4);
    let mut offset = 0;

    while offset + 2 <= data.len() {
        let segment_type = data[offset];
        let needed = usize::from(data[offset + 1]) * as_size;
        offset += 2;
        if offset + needed > data.len() {
            break;
        }

        let asns: Vec<String> = data[offset..offset + needed]
            .chunks_exact(as_size)
            .map(|c| {
                if as_size == 4 {
                    be32(c).to_string()
                } else {
                    u16::from_be_bytes([c[0], c[1]]).to_string()
                }
            })
            .collect();

        segments.push(match segment_type {
            as_path_segment_type::AS_SET => format!("{{{}}}", asns.join(",")),
            as_path_segment_type::AS_SEQUENCE => asns.join(" "),
            _ => format!("({})", asns.join(" ")),
        });
        offset += needed;
    }

    segments.join(" ").into()
}

fn segments_fit(data: &[u8], as_size: usize) -> bool {
    let mut offset = 0;
    while offset + 2 <= data.len() {
        offset += 2 + usize::from(data[offset + 1]) * as_size;
    }
    offset == data.len()
}

fn parse_notification(
    cur: &mut Cursor<'_>,
    packet: &mut FieldNode,
    end: usize,
) -> Result<(), ProtocolError> {
    let at = cur.pos();
    let code = cur.read_u8()?;
    packet.push(FieldNode::leaf(
        "Error Code",
        at,
        1,
        format_compact!("{code} ({})", error_code_name(code)),
    ));
    let subcode = cur.read_u8()?;
    packet.push(FieldNode::leaf(
        "Error Subcode",
        at + 1,
        1,
        format_compact!("{subcode} ({})", error_subcode_name(code, subcode)),
    ));

    if cur.pos() < end {
        let at = cur.pos();
        let data = cur.read_bytes(end - at)?;
        packet.push(FieldNode::leaf("Data", at, data.len(), FieldValue::hex(data)));
    }
    Ok(())
}

fn parse_route_refresh(
    cur: &mut Cursor<'_>,
    packet: &mut FieldNode,
    end: usize,
) -> Result<(), ProtocolError> {
    let at = cur.pos();
    let afi = cur.read_u16()?;
    packet.push(FieldNode::leaf(
        "AFI",
        at,
        2,
        format_compact!("{afi} ({})", afi_name(afi)),
    ));
    let subtype = cur.read_u8()?;
    packet.push(FieldNode::leaf(
        "Reserved",
        at + 2,
        1,
        format_compact!("{subtype} ({})", refresh_subtype_name(subtype)),
    ));
    let safi = cur.read_u8()?;
    packet.push(FieldNode::leaf(
        "SAFI",
        at + 3,
        1,
        format_compact!("{safi} ({})", safi_name(safi)),
    ));

    // Outbound Route Filtering entries (RFC 5291)
    if cur.pos() < end {
        let at = cur.pos();
        let orf = cur.read_bytes(end - at)?;
        packet.push(FieldNode::leaf("ORF Entries", at, orf.len(), FieldValue::hex(orf)));
    }
    Ok(())
}
