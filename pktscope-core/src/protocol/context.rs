//! Parse context and result types.

use compact_str::CompactString;
use serde::Serialize;

use super::registry::PortTable;
use crate::error::ProtocolError;

/// Hint describing the bytes a parser left unconsumed and how to continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextLayer {
    /// Absolute offset of the first unconsumed byte.
    pub offset: usize,
    /// Number of trailing bytes.
    pub length: usize,
    /// Discriminator for the registry lookup (Ethertype, IP protocol, port).
    pub type_code: u32,
    /// Layer category ("ip", "tcp", "bgp"); `None` leaves the bytes unclassified.
    pub layer: Option<CompactString>,
}

impl NextLayer {
    pub fn new(offset: usize, length: usize, type_code: u32, layer: impl Into<CompactString>) -> Self {
        Self {
            offset,
            length,
            type_code,
            layer: Some(layer.into()),
        }
    }

    /// Trailing bytes with no known interpretation.
    pub fn unclassified(offset: usize, length: usize, type_code: u32) -> Self {
        Self {
            offset,
            length,
            type_code,
            layer: None,
        }
    }

    /// Hint for `buf[offset..]`, or `None` when nothing follows the header.
    pub fn trailing(buf_len: usize, offset: usize, type_code: u32, layer: Option<&str>) -> Option<Self> {
        let length = buf_len.checked_sub(offset).filter(|&n| n > 0)?;
        Some(Self {
            offset,
            length,
            type_code,
            layer: layer.map(CompactString::from),
        })
    }
}

/// Context passed to each parser in the chain.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'r> {
    /// Absolute offset where this protocol's data starts.
    pub offset: usize,

    /// Type code this parser was dispatched with.
    pub type_code: u32,

    /// Protocol that produced the hint leading here.
    pub parent_protocol: Option<&'static str>,

    /// Runtime port bindings, consulted by transport parsers.
    pub ports: &'r PortTable,
}

impl<'r> ParseContext<'r> {
    pub fn new(offset: usize, ports: &'r PortTable) -> Self {
        Self {
            offset,
            type_code: 0,
            parent_protocol: None,
            ports,
        }
    }

    pub fn with_type_code(mut self, type_code: u32) -> Self {
        self.type_code = type_code;
        self
    }

    pub fn with_parent(mut self, parent: &'static str) -> Self {
        self.parent_protocol = Some(parent);
        self
    }
}

/// Outcome of parsing one protocol layer.
///
/// Whatever the parser attached to the tree stays attached when `error` is
/// set; callers render the partial tree together with the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// Bytes this layer accounted for, starting at the context offset.
    pub consumed: usize,

    /// How to continue, if anything follows.
    pub next_layer: Option<NextLayer>,

    /// Parse error, if any.
    pub error: Option<ProtocolError>,
}

impl ParseResult {
    /// Create a successful parse result.
    pub fn success(consumed: usize, next_layer: Option<NextLayer>) -> Self {
        Self {
            consumed,
            next_layer,
            error: None,
        }
    }

    /// Create an error result with nothing consumed.
    pub fn error(error: ProtocolError) -> Self {
        Self {
            consumed: 0,
            next_layer: None,
            error: Some(error),
        }
    }

    /// Create a result for a layer that failed after consuming some bytes.
    pub fn partial(consumed: usize, error: ProtocolError) -> Self {
        Self {
            consumed,
            next_layer: None,
            error: Some(error),
        }
    }

    /// Check if parsing succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, dropping the byte count.
    pub fn into_result(self) -> Result<Option<NextLayer>, ProtocolError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.next_layer),
        }
    }
}

/// Internal parser result: bytes consumed and the continuation hint.
pub(crate) type LayerResult = Result<(usize, Option<NextLayer>), ProtocolError>;

impl From<LayerResult> for ParseResult {
    fn from(result: LayerResult) -> Self {
        match result {
            Ok((consumed, next_layer)) => ParseResult::success(consumed, next_layer),
            Err(e) => ParseResult::error(e),
        }
    }
}

/// Require that a header consumed exactly its declared length.
pub(crate) fn ensure_consumed(
    protocol: &'static str,
    declared: usize,
    consumed: usize,
) -> Result<(), ProtocolError> {
    if declared != consumed {
        return Err(ProtocolError::LengthMismatch {
            protocol,
            declared,
            consumed,
        });
    }
    Ok(())
}
