//! Field tree types.
//!
//! Every parser reports what it decoded as [`FieldNode`]s: a named byte range
//! of the original buffer with a rendered value and ordered children. Offsets
//! are absolute, so a node can be highlighted in a hex view without knowing
//! which layer produced it.

use std::fmt;

use compact_str::{format_compact, CompactString};
use serde::Serialize;
use thiserror::Error;

/// Rendered value of a field.
///
/// Serializes untagged: `null`, a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Purely structural node (headers, containers)
    #[default]
    Empty,
    /// Unsigned integer shown as-is
    Number(u64),
    /// Human-readable text ("1 (ARP Request)", "10.0.0.1")
    Text(CompactString),
}

impl FieldValue {
    /// Text value from formatted arguments.
    pub fn text(value: impl Into<CompactString>) -> Self {
        FieldValue::Text(value.into())
    }

    /// Lowercase hex rendering of raw bytes.
    pub fn hex(bytes: &[u8]) -> Self {
        FieldValue::Text(CompactString::from(hex::encode(bytes)))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    /// Numeric value, if this is a number.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Number(u64::from(v))
                }
            }
        )*
    };
}

number_from!(u8, u16, u32, u64);

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(CompactString::from(v))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(CompactString::from(v))
    }
}

impl From<CompactString> for FieldValue {
    fn from(v: CompactString) -> Self {
        FieldValue::Text(v)
    }
}

/// One node of a dissection tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldNode {
    pub name: CompactString,
    /// Absolute offset into the dissected buffer.
    pub offset: usize,
    pub length: usize,
    /// Set on bit fields that share their bytes with neighbouring fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits: Option<BitRange>,
    pub value: FieldValue,
    pub children: Vec<FieldNode>,
}

/// Bits of a node's byte range that a bit field occupies, counted from the
/// most significant bit of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitRange {
    pub start: u8,
    pub len: u8,
}

/// A node whose byte range breaks the tree layout rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{node}' at offset {offset}: {reason}")]
pub struct LayoutError {
    pub node: CompactString,
    pub offset: usize,
    pub reason: &'static str,
}

impl FieldNode {
    /// Structural node with no value.
    pub fn new(name: impl Into<CompactString>, offset: usize, length: usize) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            bits: None,
            value: FieldValue::Empty,
            children: Vec::new(),
        }
    }

    /// Leaf node with a value.
    pub fn leaf(
        name: impl Into<CompactString>,
        offset: usize,
        length: usize,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            bits: None,
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Root node spanning `buf[offset..]`, named e.g. "Ethernet Frame 42 bytes".
    ///
    /// An offset past the end is clamped, leaving an empty root at `buf_len`.
    pub fn root(label: &str, buf_len: usize, offset: usize) -> Self {
        let offset = offset.min(buf_len);
        let length = buf_len - offset;
        Self::new(format_compact!("{label} {length} bytes"), offset, length)
    }

    /// Mark this node as the bit field `start..start + len` of its bytes.
    pub fn with_bits(mut self, start: u8, len: u8) -> Self {
        self.bits = Some(BitRange { start, len });
        self
    }

    pub fn with_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.value = value.into();
        self
    }

    /// Append a child and return a handle to it, so nested structures can be
    /// filled in place and survive an early error return.
    pub fn push(&mut self, child: FieldNode) -> &mut FieldNode {
        let idx = self.children.len();
        self.children.push(child);
        &mut self.children[idx]
    }

    /// Exclusive end offset.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Occupied span in bits from the start of the buffer.
    fn bit_span(&self) -> (usize, usize) {
        match self.bits {
            Some(b) => {
                let start = self.offset * 8 + usize::from(b.start);
                (start, start + usize::from(b.len))
            }
            None => (self.offset * 8, self.end() * 8),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&FieldNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a path of child names from this node.
    pub fn find_path(&self, path: &[&str]) -> Option<&FieldNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Depth-first search for the first node with the given name (self included).
    pub fn find(&self, name: &str) -> Option<&FieldNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Pre-order walk over this node and all descendants.
    pub fn walk(&self) -> impl Iterator<Item = &FieldNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Number of nodes in this subtree.
    pub fn count(&self) -> usize {
        self.walk().count()
    }

    /// Check the layout invariant against a buffer of `buf_len` bytes:
    /// every node ends inside the buffer, and children are ordered,
    /// non-overlapping and contained in their parent.
    pub fn check_layout(&self, buf_len: usize) -> Result<(), LayoutError> {
        if self.end() > buf_len {
            return Err(self.layout_error("extends past end of buffer"));
        }
        if let Some(b) = self.bits {
            if usize::from(b.start) + usize::from(b.len) > self.length * 8 {
                return Err(self.layout_error("bit field extends past its bytes"));
            }
        }
        // siblings may share a byte as long as their bits do not overlap
        let mut cursor = self.bit_span().0;
        for child in &self.children {
            let (start, end) = child.bit_span();
            if start < cursor {
                return Err(child.layout_error("overlaps previous sibling or starts before parent"));
            }
            if child.end() > self.end() {
                return Err(child.layout_error("extends past end of parent"));
            }
            child.check_layout(buf_len)?;
            cursor = end;
        }
        Ok(())
    }

    fn layout_error(&self, reason: &'static str) -> LayoutError {
        LayoutError {
            node: self.name.clone(),
            offset: self.offset,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FieldNode {
        let mut root = FieldNode::root("Ethernet Frame", 20, 0);
        let header = root.push(FieldNode::new("Ethernet Header", 0, 14));
        header.push(FieldNode::leaf("Destination MAC", 0, 6, "FF:FF:FF:FF:FF:FF"));
        header.push(FieldNode::leaf("Source MAC", 6, 6, "00:11:22:33:44:55"));
        header.push(FieldNode::leaf("Type/Length", 12, 2, "0x0806 (ARP)"));
        root.push(FieldNode::leaf("Payload", 14, 6, FieldValue::hex(&[0; 6])));
        root
    }

    #[test]
    fn test_root_name() {
        let root = FieldNode::root("IP Packet", 60, 14);
        assert_eq!(root.name, "IP Packet 46 bytes");
        assert_eq!(root.offset, 14);
        assert_eq!(root.length, 46);
    }

    #[test]
    fn test_root_offset_past_buffer() {
        let root = FieldNode::root("BGP Packet", 4, 10);
        assert_eq!(root.name, "BGP Packet 0 bytes");
        assert_eq!(root.offset, 4);
        assert_eq!(root.length, 0);
        assert!(root.check_layout(4).is_ok());
    }

    #[test]
    fn test_lookup() {
        let root = sample();
        assert_eq!(root.count(), 6);
        assert_eq!(
            root.find_path(&["Ethernet Header", "Type/Length"])
                .and_then(|n| n.value.as_str()),
            Some("0x0806 (ARP)")
        );
        assert_eq!(root.find("Source MAC").map(|n| n.offset), Some(6));
        assert!(root.find("Sender MAC").is_none());

        let names: Vec<_> = root.walk().map(|n| n.name.as_str()).collect();
        assert_eq!(names[1], "Ethernet Header");
        assert_eq!(names[2], "Destination MAC");
        assert_eq!(names[5], "Payload");
    }

    #[test]
    fn test_layout_ok() {
        assert!(sample().check_layout(20).is_ok());
    }

    #[test]
    fn test_layout_past_buffer() {
        let err = sample().check_layout(18).unwrap_err();
        assert_eq!(err.reason, "extends past end of buffer");
    }

    #[test]
    fn test_layout_overlap() {
        let mut node = FieldNode::new("Header", 0, 8);
        node.push(FieldNode::leaf("A", 0, 4, 1u8));
        node.push(FieldNode::leaf("B", 2, 4, 2u8));
        let err = node.check_layout(8).unwrap_err();
        assert_eq!(err.node, "B");
    }

    #[test]
    fn test_layout_child_outside_parent() {
        let mut node = FieldNode::new("Header", 4, 4);
        node.push(FieldNode::leaf("A", 6, 4, 1u8));
        assert!(node.check_layout(16).is_err());
    }

    #[test]
    fn test_layout_bit_fields_share_bytes() {
        // 4 + 8 + 20 bits packed into one 32-bit word
        let mut word = FieldNode::new("Word", 0, 4);
        word.push(FieldNode::leaf("A", 0, 1, 6u8).with_bits(0, 4));
        word.push(FieldNode::leaf("B", 0, 2, 0xb8u8).with_bits(4, 8));
        word.push(FieldNode::leaf("C", 1, 3, 0x12345u32).with_bits(4, 20));
        assert!(word.check_layout(4).is_ok());

        let mut word = FieldNode::new("Word", 0, 4);
        word.push(FieldNode::leaf("A", 0, 1, 6u8).with_bits(0, 4));
        word.push(FieldNode::leaf("B", 0, 2, 0xb8u8).with_bits(3, 8));
        assert_eq!(word.check_layout(4).unwrap_err().node, "B");

        let node = FieldNode::leaf("Wide", 0, 1, 1u8).with_bits(4, 8);
        assert_eq!(node.check_layout(1).unwrap_err().reason, "bit field extends past its bytes");
    }

    #[test]
    fn test_value_json() {
        let node = FieldNode::leaf("Hold Time", 0, 2, 180u16);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["value"], 180);
        assert_eq!(json["children"], serde_json::json!([]));

        let node = FieldNode::new("BGP Packet", 0, 19);
        let json = serde_json::to_value(&node).unwrap();
        assert!(json["value"].is_null());
        assert!(json.get("bits").is_none());

        let node = FieldNode::leaf("Flow Label", 1, 3, 0u32).with_bits(4, 20);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["bits"], serde_json::json!({"start": 4, "len": 20}));
    }
}
