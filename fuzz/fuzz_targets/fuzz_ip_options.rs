//! Fuzz target for IPv4 options and the IPv6 fixed header.
//!
//! **IPv4:**
//! - IHL validation (5-15 32-bit words)
//! - Options carried as raw bytes inside the header length
//! - Fragment offset handling
//!
//! **IPv6:**
//! - Bit-packed version, traffic class and flow label
//! - Next header classification

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktscope_core::{default_registry, dissect, StartLayer};

/// Build an IPv4 header with the given IHL and options.
fn build_ipv4_header(ihl: u8, flags_frag: [u8; 2], options: &[u8]) -> Vec<u8> {
    let mut header = Vec::with_capacity(60);
    header.push((4 << 4) | (ihl & 0x0f));
    header.push(0x00); // DSCP + ECN
    let total = (20 + options.len()) as u16;
    header.extend_from_slice(&total.to_be_bytes());
    header.extend_from_slice(&[0x00, 0x01]); // identification
    header.extend_from_slice(&flags_frag);
    header.push(64); // TTL
    header.push(6); // protocol TCP
    header.extend_from_slice(&[0x00, 0x00]); // checksum
    header.extend_from_slice(&[10, 0, 0, 1]);
    header.extend_from_slice(&[10, 0, 0, 2]);
    header.extend_from_slice(options);
    header
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let registry = default_registry();

    // First byte picks the IHL, next two the flags/fragment field
    let ihl = data[0];
    let options = &data[3..data.len().min(43)];
    let packet = build_ipv4_header(ihl, [data[1], data[2]], options);
    let d = dissect(&registry, &packet, 0, StartLayer::Ip);
    assert!(d.tree.check_layout(packet.len()).is_ok());

    // The same bytes behind an IPv6 version nibble
    let mut v6 = data.to_vec();
    v6[0] = 0x60 | (v6[0] & 0x0f);
    let d = dissect(&registry, &v6, 0, StartLayer::Ip);
    assert!(d.tree.check_layout(v6.len()).is_ok());
});
