//! Protocol registry: `(layer, type)` bindings, runtime port table and the
//! dispatch loop that walks the layer chain.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use compact_str::CompactString;
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::{
    ArpProtocol, BgpProtocol, EthernetProtocol, FieldNode, FieldValue, Ipv4Protocol,
    Ipv6Protocol, NextLayer, ParseContext, ParseResult, TcpProtocol, UdpProtocol,
};
use crate::error::ProtocolError;

/// Core trait all protocol parsers must implement.
pub trait Protocol: Send + Sync {
    /// Unique identifier for this protocol (e.g., "tcp", "bgp").
    fn name(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Parse the header at `ctx.offset`, appending its node to `parent`.
    ///
    /// Must not touch `parent` when the fixed header does not fit.
    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult;

    /// Layer names this protocol may hint at.
    fn child_layers(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Enum of all built-in protocol parsers.
///
/// Static dispatch over a closed set; the registry stores these by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinProtocol {
    Ethernet(EthernetProtocol),
    Arp(ArpProtocol),
    Ipv4(Ipv4Protocol),
    Ipv6(Ipv6Protocol),
    Tcp(TcpProtocol),
    Udp(UdpProtocol),
    Bgp(BgpProtocol),
}

/// Macro to delegate Protocol trait methods to inner types.
macro_rules! delegate_protocol {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            BuiltinProtocol::Ethernet(p) => p.$method($($arg),*),
            BuiltinProtocol::Arp(p) => p.$method($($arg),*),
            BuiltinProtocol::Ipv4(p) => p.$method($($arg),*),
            BuiltinProtocol::Ipv6(p) => p.$method($($arg),*),
            BuiltinProtocol::Tcp(p) => p.$method($($arg),*),
            BuiltinProtocol::Udp(p) => p.$method($($arg),*),
            BuiltinProtocol::Bgp(p) => p.$method($($arg),*),
        }
    };
}

impl Protocol for BuiltinProtocol {
    #[inline]
    fn name(&self) -> &'static str {
        delegate_protocol!(self, name)
    }

    #[inline]
    fn display_name(&self) -> &'static str {
        delegate_protocol!(self, display_name)
    }

    #[inline]
    fn parse(&self, buf: &[u8], parent: &mut FieldNode, ctx: &ParseContext<'_>) -> ParseResult {
        delegate_protocol!(self, parse, buf, parent, ctx)
    }

    #[inline]
    fn child_layers(&self) -> &'static [&'static str] {
        delegate_protocol!(self, child_layers)
    }
}

macro_rules! builtin_from {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for BuiltinProtocol {
                fn from(p: $ty) -> Self {
                    BuiltinProtocol::$variant(p)
                }
            }
        )*
    };
}

builtin_from! {
    Ethernet => EthernetProtocol,
    Arp => ArpProtocol,
    Ipv4 => Ipv4Protocol,
    Ipv6 => Ipv6Protocol,
    Tcp => TcpProtocol,
    Udp => UdpProtocol,
    Bgp => BgpProtocol,
}

/// Runtime `port -> layer` table for protocols recognized by port number.
///
/// Emulated servers add and remove entries while dissections run on other
/// threads, so access goes through a reader/writer lock.
#[derive(Debug, Default)]
pub struct PortTable {
    ports: RwLock<HashMap<u16, CompactString>>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `port` to `layer`, returning the previous binding.
    pub fn insert(&self, port: u16, layer: &str) -> Option<CompactString> {
        self.ports.write().insert(port, CompactString::from(layer))
    }

    /// Remove the binding for `port`, whatever layer it points at.
    pub fn remove(&self, port: u16) -> Option<CompactString> {
        self.ports.write().remove(&port)
    }

    /// Remove the binding for `port` only if it points at `layer`.
    pub fn remove_if(&self, port: u16, layer: &str) -> bool {
        let mut ports = self.ports.write();
        if ports.get(&port).is_some_and(|l| l.as_str() == layer) {
            ports.remove(&port);
            true
        } else {
            false
        }
    }

    /// Remove every port bound to `layer`.
    pub fn remove_layer(&self, layer: &str) -> usize {
        let mut ports = self.ports.write();
        let before = ports.len();
        ports.retain(|_, l| l.as_str() != layer);
        before - ports.len()
    }

    pub fn resolve(&self, port: u16) -> Option<CompactString> {
        self.ports.read().get(&port).cloned()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.read().contains_key(&port)
    }

    /// Resolve a (source, destination) port pair. The source port is checked
    /// first, so it wins when both ports are bound.
    pub fn resolve_pair(&self, src: u16, dst: u16) -> Option<(CompactString, u16)> {
        let ports = self.ports.read();
        [src, dst]
            .into_iter()
            .find_map(|p| ports.get(&p).map(|l| (l.clone(), p)))
    }

    /// Sorted copy of the current bindings.
    pub fn snapshot(&self) -> Vec<(u16, CompactString)> {
        let mut out: Vec<_> = self
            .ports
            .read()
            .iter()
            .map(|(p, l)| (*p, l.clone()))
            .collect();
        out.sort_by_key(|(p, _)| *p);
        out
    }

    pub fn len(&self) -> usize {
        self.ports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.read().is_empty()
    }
}

impl Clone for PortTable {
    fn clone(&self) -> Self {
        Self {
            ports: RwLock::new(self.ports.read().clone()),
        }
    }
}

/// Where a dissection chain stopped on bytes no parser claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unclassified {
    pub offset: usize,
    pub length: usize,
    /// Layer named by the hint, if any.
    pub layer: Option<CompactString>,
    pub type_code: u32,
    /// Why the bytes were left raw (unregistered layer).
    pub reason: Option<String>,
}

/// Outcome of walking a chain of layers through [`ProtocolRegistry::dispatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    /// Protocols that ran, in chain order.
    pub layers: SmallVec<[&'static str; 8]>,
    /// First error raised; the walk stopped there.
    pub error: Option<ProtocolError>,
    /// Set when the walk ended on unclassified trailing bytes.
    pub unclassified: Option<Unclassified>,
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Registry mapping `(layer, type)` to parsers, plus the runtime port table.
///
/// Bindings are set up through `&mut self`, normally once at startup. Port
/// bindings change through `&self` while the registry is shared.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    bindings: HashMap<(CompactString, u32), BuiltinProtocol>,
    /// Parser used for any port bound to the layer at runtime.
    port_parsers: HashMap<CompactString, BuiltinProtocol>,
    ports: PortTable,
}

impl ProtocolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `parser` to `(layer, type_code)`, replacing any previous binding.
    ///
    /// With `is_port_protocol`, `type_code` is a port: it is also recorded in
    /// the port table and the parser serves ports bound to `layer` later.
    pub fn register<P: Into<BuiltinProtocol>>(
        &mut self,
        layer: &str,
        type_code: u32,
        parser: P,
        is_port_protocol: bool,
    ) {
        let parser = parser.into();
        let key = CompactString::from(layer);
        if is_port_protocol {
            match u16::try_from(type_code) {
                Ok(port) => {
                    self.ports.insert(port, layer);
                }
                Err(_) => warn!(layer, type_code, "port protocol type code is not a port"),
            }
            self.port_parsers.insert(key.clone(), parser);
        }
        debug!(layer, type_code, protocol = parser.name(), "registered parser");
        self.bindings.insert((key, type_code), parser);
    }

    /// Remove bindings for `layer`.
    ///
    /// With a port, only that port's binding goes (from both tables; the port
    /// table entry only if it points at `layer`). Without one, every binding
    /// for the layer and every port pointing at it goes.
    pub fn unregister(&mut self, layer: &str, port: Option<u16>) {
        match port {
            Some(port) => {
                self.ports.remove_if(port, layer);
                self.bindings
                    .remove(&(CompactString::from(layer), u32::from(port)));
            }
            None => {
                self.bindings.retain(|(l, _), _| l.as_str() != layer);
                self.port_parsers.remove(layer);
                self.ports.remove_layer(layer);
            }
        }
        debug!(layer, ?port, "unregistered parser");
    }

    /// Bind `port` to `layer` at runtime (an emulator started listening).
    pub fn register_protocol_port(&self, layer: &str, port: u16) {
        if let Some(prev) = self.ports.insert(port, layer) {
            if prev.as_str() != layer {
                debug!(port, layer, previous = %prev, "port rebound");
            }
        }
        if !self.port_parsers.contains_key(layer) {
            warn!(layer, port, "no port parser for layer; payloads will stay unclassified");
        }
    }

    /// Drop the runtime binding for `port`, returning the layer it pointed at.
    pub fn unregister_protocol_port(&self, port: u16) -> Option<CompactString> {
        self.ports.remove(port)
    }

    /// Bind `port` to `layer` until the returned guard drops; the previous
    /// binding, if any, is restored then.
    pub fn bind_port(&self, layer: &str, port: u16) -> PortBinding<'_> {
        let previous = self.ports.insert(port, layer);
        PortBinding {
            ports: &self.ports,
            layer: CompactString::from(layer),
            port,
            previous,
        }
    }

    pub fn resolve_by_port(&self, port: u16) -> Option<CompactString> {
        self.ports.resolve(port)
    }

    pub fn has_protocol_for_port(&self, port: u16) -> bool {
        self.ports.contains(port)
    }

    /// Layer for a source/destination port pair; the source port wins ties.
    pub fn resolve_ports(&self, src: u16, dst: u16) -> Option<(CompactString, u16)> {
        self.ports.resolve_pair(src, dst)
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    /// Parser for `(layer, type_code)`: the exact binding, else the layer's
    /// port parser when `type_code` is a port currently bound to `layer`.
    pub fn get_parser(&self, layer: &str, type_code: u32) -> Option<&BuiltinProtocol> {
        let key = (CompactString::from(layer), type_code);
        if let Some(parser) = self.bindings.get(&key) {
            return Some(parser);
        }
        let port = u16::try_from(type_code).ok()?;
        if self.ports.resolve(port)?.as_str() != layer {
            return None;
        }
        self.port_parsers.get(layer)
    }

    /// Static bindings, sorted by layer then type.
    pub fn bindings(&self) -> Vec<(&str, u32, &BuiltinProtocol)> {
        let mut out: Vec<_> = self
            .bindings
            .iter()
            .map(|((layer, ty), p)| (layer.as_str(), *ty, p))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        out
    }

    /// Number of static bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Parse `buf` from `offset` with the parser bound to `(layer, type_code)`,
    /// then follow next-layer hints until the chain ends.
    ///
    /// Layers attach their nodes to `tree`. A missing binding for the starting
    /// pair is an error; a missing binding reached through a hint only ends the
    /// chain, leaving the trailing bytes as a raw "Payload" node.
    pub fn dispatch(
        &self,
        layer: &str,
        type_code: u32,
        tree: &mut FieldNode,
        buf: &[u8],
        offset: usize,
    ) -> DispatchResult {
        let mut out = DispatchResult::default();

        let Some(mut parser) = self.get_parser(layer, type_code).copied() else {
            debug!(layer, type_code, "no parser registered");
            out.error = Some(ProtocolError::NoParser {
                layer: CompactString::from(layer),
                type_code,
            });
            return out;
        };
        let mut ctx = ParseContext::new(offset, &self.ports).with_type_code(type_code);

        loop {
            debug!(protocol = parser.name(), offset = ctx.offset, "dissecting layer");
            let result = invoke(&parser, buf, tree, &ctx);
            out.layers.push(parser.name());

            if let Some(err) = result.error {
                debug!(protocol = parser.name(), error = %err, "layer failed");
                out.error = Some(err);
                return out;
            }
            let Some(next) = result.next_layer else {
                return out;
            };
            trace!(?next, "next layer hint");

            if next.offset <= ctx.offset || next.offset >= buf.len() {
                out.error = Some(ProtocolError::Internal {
                    protocol: parser.display_name(),
                    reason: format!("next layer offset {} out of range", next.offset),
                });
                return out;
            }

            let Some(next_layer) = next.layer.as_deref() else {
                tree.push(raw_payload(buf, &next));
                out.unclassified = Some(Unclassified {
                    offset: next.offset,
                    length: next.length,
                    layer: None,
                    type_code: next.type_code,
                    reason: None,
                });
                return out;
            };

            match self.get_parser(next_layer, next.type_code) {
                Some(p) => {
                    ctx = ParseContext::new(next.offset, &self.ports)
                        .with_type_code(next.type_code)
                        .with_parent(parser.name());
                    parser = *p;
                }
                None => {
                    let reason = ProtocolError::NoParser {
                        layer: CompactString::from(next_layer),
                        type_code: next.type_code,
                    };
                    debug!(%reason, "chain ends at unregistered layer");
                    tree.push(raw_payload(buf, &next));
                    out.unclassified = Some(Unclassified {
                        offset: next.offset,
                        length: next.length,
                        layer: next.layer.clone(),
                        type_code: next.type_code,
                        reason: Some(reason.to_string()),
                    });
                    return out;
                }
            }
        }
    }
}

/// Guard returned by [`ProtocolRegistry::bind_port`].
#[derive(Debug)]
#[must_use = "the port binding is removed when the guard drops"]
pub struct PortBinding<'r> {
    ports: &'r PortTable,
    layer: CompactString,
    port: u16,
    previous: Option<CompactString>,
}

impl PortBinding<'_> {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortBinding<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(prev) => {
                self.ports.insert(self.port, &prev);
            }
            None => {
                self.ports.remove_if(self.port, &self.layer);
            }
        }
    }
}

/// Run one parser, converting a panic into an `Internal` error.
fn invoke(
    parser: &BuiltinProtocol,
    buf: &[u8],
    tree: &mut FieldNode,
    ctx: &ParseContext<'_>,
) -> ParseResult {
    match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(buf, tree, ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "parser panicked".to_string());
            warn!(protocol = parser.name(), %reason, "parser panicked");
            ParseResult::error(ProtocolError::Internal {
                protocol: parser.display_name(),
                reason,
            })
        }
    }
}

/// Raw node for bytes the chain could not classify.
fn raw_payload(buf: &[u8], hint: &NextLayer) -> FieldNode {
    let start = hint.offset.min(buf.len());
    let end = start.saturating_add(hint.length).min(buf.len());
    let bytes = buf.get(start..end).unwrap_or_default();
    FieldNode::leaf("Payload", start, end - start, FieldValue::hex(bytes))
}
