//! Error types for pktscope-core.
//!
//! - [`enum@Error`] - Top-level error for driver entry points
//! - [`ProtocolError`] - Errors raised while dissecting a protocol layer
//! - [`ErrorKind`] - Coarse classification of a [`ProtocolError`]
//!
//! Protocol errors never abort the process. Parsers return them alongside
//! whatever part of the field tree was already built.

use compact_str::CompactString;
use thiserror::Error;

/// Main error type for pktscope-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error during protocol dissection
    #[error("Protocol parse error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input text was not valid hex
    #[error("Invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Input was empty after stripping separators
    #[error("Empty packet input")]
    EmptyInput,
}

/// Coarse classification of protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Declared or fixed header size exceeds the available bytes.
    BufferTooShort,
    /// Bytes consumed disagree with a declared length, or a field is out of range.
    StructuralInconsistency,
    /// A field required to hold a constant does not.
    InvalidFixedValue,
    /// No parser is bound for the resolved (layer, type) pair.
    UnregisteredProtocol,
    /// A parser faulted unexpectedly.
    Unexpected,
}

/// Errors related to protocol parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet too short for protocol header
    #[error("{protocol}: packet too short (need {needed} bytes, have {have})")]
    PacketTooShort {
        protocol: &'static str,
        needed: usize,
        have: usize,
    },

    /// Bytes consumed while parsing a header differ from its declared length
    #[error("{protocol}: header length mismatch (declared {declared} bytes, consumed {consumed})")]
    LengthMismatch {
        protocol: &'static str,
        declared: usize,
        consumed: usize,
    },

    /// Invalid header field value
    #[error("{protocol}: invalid {field}: {reason}")]
    InvalidField {
        protocol: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A constant field holds the wrong value
    #[error("Invalid {protocol} {field}")]
    InvalidFixedValue {
        protocol: &'static str,
        field: &'static str,
    },

    /// No parser bound for (layer, type)
    #[error("No parser registered for {layer} type {type_code:#x}")]
    NoParser {
        layer: CompactString,
        type_code: u32,
    },

    /// A parser panicked; caught at the dispatch boundary
    #[error("Error parsing {protocol} packet: {reason}")]
    Internal {
        protocol: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::PacketTooShort { .. } => ErrorKind::BufferTooShort,
            ProtocolError::LengthMismatch { .. } | ProtocolError::InvalidField { .. } => {
                ErrorKind::StructuralInconsistency
            }
            ProtocolError::InvalidFixedValue { .. } => ErrorKind::InvalidFixedValue,
            ProtocolError::NoParser { .. } => ErrorKind::UnregisteredProtocol,
            ProtocolError::Internal { .. } => ErrorKind::Unexpected,
        }
    }

    pub(crate) fn too_short(protocol: &'static str, needed: usize, have: usize) -> Self {
        ProtocolError::PacketTooShort {
            protocol,
            needed,
            have,
        }
    }

    pub(crate) fn invalid(
        protocol: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ProtocolError::InvalidField {
            protocol,
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ProtocolError::InvalidFixedValue {
            protocol: "BGP",
            field: "marker",
        };
        assert_eq!(err.to_string(), "Invalid BGP marker");
        assert_eq!(err.kind(), ErrorKind::InvalidFixedValue);

        let err = ProtocolError::NoParser {
            layer: "vlan".into(),
            type_code: 0x8100,
        };
        assert_eq!(err.to_string(), "No parser registered for vlan type 0x8100");
        assert_eq!(err.kind(), ErrorKind::UnregisteredProtocol);

        let err = ProtocolError::too_short("TCP", 32, 24);
        assert_eq!(
            err.to_string(),
            "TCP: packet too short (need 32 bytes, have 24)"
        );
        assert_eq!(err.kind(), ErrorKind::BufferTooShort);
    }

    #[test]
    fn test_wraps_into_error() {
        let err: Error = ProtocolError::LengthMismatch {
            protocol: "IPv4",
            declared: 24,
            consumed: 20,
        }
        .into();
        assert!(err.to_string().contains("declared 24 bytes, consumed 20"));
    }
}
