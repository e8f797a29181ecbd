//! Fuzz target for TCP options parsing.
//!
//! The TCP parser decodes:
//! - EOL (kind=0) and NOP (kind=1)
//! - MSS (kind=2)
//! - Window Scale (kind=3)
//! - SACK Permitted (kind=4) and SACK blocks (kind=5)
//! - Timestamp (kind=8)
//! - Unknown kinds as raw bytes
//!
//! Fuzz data becomes the TCP options, not the payload after the header.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktscope_core::{default_registry, dissect, StartLayer};

/// Build a TCP segment with the given data offset and options.
fn build_tcp_header(data_offset: u8, options: &[u8]) -> Vec<u8> {
    let mut header = Vec::with_capacity(60);
    header.extend_from_slice(&[0x30, 0x39]); // src port 12345
    header.extend_from_slice(&[0x00, 0xb3]); // dst port 179
    header.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]); // seq
    header.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // ack
    header.push(data_offset << 4);
    header.push(0x02); // SYN
    header.extend_from_slice(&[0xff, 0xff]); // window
    header.extend_from_slice(&[0x00, 0x00]); // checksum
    header.extend_from_slice(&[0x00, 0x00]); // urgent pointer
    header.extend_from_slice(options);
    header
}

fuzz_target!(|data: &[u8]| {
    // Options are 0-40 bytes
    if data.is_empty() || data.len() > 40 {
        return;
    }

    let registry = default_registry();

    let padding = (4 - data.len() % 4) % 4;
    let mut options = data.to_vec();
    options.resize(data.len() + padding, 0);
    let data_offset = ((20 + options.len()) / 4) as u8;

    let segment = build_tcp_header(data_offset, &options);
    let d = dissect(&registry, &segment, 0, StartLayer::Tcp);
    assert!(d.tree.check_layout(segment.len()).is_ok());

    // Same options with the header cut short of its declared length
    let cut = &segment[..segment.len() - padding.max(1)];
    let d = dissect(&registry, cut, 0, StartLayer::Tcp);
    assert!(!d.valid);
    assert!(d.tree.check_layout(cut.len()).is_ok());
});
