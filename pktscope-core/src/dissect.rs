//! Dissection driver.
//!
//! Picks the starting parser for a [`StartLayer`], walks the layer chain
//! through [`ProtocolRegistry::dispatch`] and packages the tree together with
//! the outcome.

use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{
    ethertype, ip_proto, FieldNode, ProtocolRegistry, Unclassified, BGP_PORT, LINKTYPE_ETHERNET,
};

/// Layer a dissection starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartLayer {
    /// Ethernet II frame.
    Ethernet,
    /// IPv4 or IPv6 packet, chosen by the version nibble.
    Ip,
    /// TCP segment.
    Tcp,
    /// UDP datagram.
    Udp,
    /// BGP message stream.
    Bgp,
}

impl StartLayer {
    /// Registry key for the first parser, looking at the first byte for `Ip`.
    fn registry_key(self, buf: &[u8], offset: usize) -> (&'static str, u32) {
        match self {
            StartLayer::Ethernet => ("ethernet", u32::from(LINKTYPE_ETHERNET)),
            StartLayer::Ip => {
                let version = buf.get(offset).map(|b| b >> 4);
                let ty = if version == Some(6) {
                    ethertype::IPV6
                } else {
                    // anything else goes to IPv4, which reports the bad version
                    ethertype::IPV4
                };
                ("ip", u32::from(ty))
            }
            StartLayer::Tcp => ("tcp", u32::from(ip_proto::TCP)),
            StartLayer::Udp => ("udp", u32::from(ip_proto::UDP)),
            StartLayer::Bgp => ("bgp", u32::from(BGP_PORT)),
        }
    }

    /// Label of the root node.
    fn root_label(self) -> &'static str {
        match self {
            StartLayer::Ethernet => "Ethernet Frame",
            StartLayer::Ip => "IP Packet",
            StartLayer::Tcp | StartLayer::Udp => "Transport Protocol",
            StartLayer::Bgp => "BGP Packet",
        }
    }
}

/// Result of dissecting one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dissection {
    /// Root node spanning the dissected bytes; partial when `error` is set.
    pub tree: FieldNode,
    /// False when a layer failed.
    pub valid: bool,
    /// First error raised along the chain.
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ProtocolError>,
    /// Protocols that ran, in chain order.
    pub layers: SmallVec<[&'static str; 8]>,
    /// Where the chain ended on bytes no parser claimed.
    pub unclassified: Option<Unclassified>,
}

fn serialize_error<S: Serializer>(
    error: &Option<ProtocolError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

/// Dissect an Ethernet frame from its first byte.
pub fn dissect_frame(registry: &ProtocolRegistry, buf: &[u8]) -> Dissection {
    dissect(registry, buf, 0, StartLayer::Ethernet)
}

/// Dissect `buf[offset..]` starting at `start`.
///
/// Never fails outright: errors are reported in the returned [`Dissection`]
/// next to whatever part of the tree was built.
pub fn dissect(
    registry: &ProtocolRegistry,
    buf: &[u8],
    offset: usize,
    start: StartLayer,
) -> Dissection {
    let (layer, type_code) = start.registry_key(buf, offset);
    debug!(?start, offset, len = buf.len(), "dissecting buffer");

    let mut tree = FieldNode::root(start.root_label(), buf.len(), offset);
    let outcome = registry.dispatch(layer, type_code, &mut tree, buf, offset);

    Dissection {
        tree,
        valid: outcome.error.is_none(),
        error: outcome.error,
        layers: outcome.layers,
        unclassified: outcome.unclassified,
    }
}

/// Dissect a hex-encoded buffer.
///
/// See [`parse_hex`] for the accepted notation.
pub fn dissect_hex(registry: &ProtocolRegistry, text: &str, start: StartLayer) -> Result<Dissection> {
    let bytes = parse_hex(text)?;
    Ok(dissect(registry, &bytes, 0, start))
}

/// Decode hex text. Whitespace, `:` separators and `0x` prefixes on each
/// whitespace-separated token are ignored.
///
/// ```
/// use pktscope_core::dissect::parse_hex;
///
/// assert_eq!(parse_hex("0xff 00:11").unwrap(), vec![0xff, 0x00, 0x11]);
/// assert!(parse_hex("  ").is_err());
/// ```
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text
        .split_whitespace()
        .map(|tok| {
            tok.strip_prefix("0x")
                .or_else(|| tok.strip_prefix("0X"))
                .unwrap_or(tok)
        })
        .flat_map(|tok| tok.chars().filter(|&c| c != ':'))
        .collect();
    if digits.is_empty() {
        return Err(Error::EmptyInput);
    }
    Ok(hex::decode(digits)?)
}
