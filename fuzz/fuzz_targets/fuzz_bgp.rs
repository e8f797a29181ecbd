//! Fuzz target for the BGP message parser.
//!
//! Covers:
//! - OPEN, UPDATE, NOTIFICATION, KEEPALIVE, ROUTE-REFRESH messages
//! - Optional parameters and capabilities
//! - Variable-length path attributes and AS_PATH rendering
//! - Prefix length validation
//! - Several messages in one segment
//!
//! Fuzz data is used both as a bare message stream and as the payload of a
//! TCP segment to port 179.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktscope_core::{default_registry, dissect, dissect_frame, StartLayer};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let registry = default_registry();

    let d = dissect(&registry, data, 0, StartLayer::Bgp);
    assert!(d.tree.check_layout(data.len()).is_ok());

    // Build frame: Ethernet (14) + IPv4 (20) + TCP (20) + BGP payload
    let mut frame = vec![
        // Ethernet header (14 bytes)
        0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // dst mac
        0x00, 0x00, 0x00, 0x00, 0x00, 0x02, // src mac
        0x08, 0x00, // ethertype IPv4
        // IPv4 header (20 bytes)
        0x45, 0x00, 0x00, 0x00, // version=4, ihl=5, dscp=0, total_len (patched below)
        0x00, 0x01, 0x00, 0x00, // id=1, flags=0, frag_offset=0
        0x40, 0x06, 0x00, 0x00, // ttl=64, protocol=TCP(6), checksum=0
        0x0a, 0x00, 0x00, 0x01, // src ip: 10.0.0.1
        0x0a, 0x00, 0x00, 0x02, // dst ip: 10.0.0.2
        // TCP header (20 bytes)
        0x9c, 0x40, // src_port = 40000
        0x00, 0xb3, // dst_port = 179 (BGP)
        0x00, 0x00, 0x00, 0x01, // seq = 1
        0x00, 0x00, 0x00, 0x00, // ack = 0
        0x50, 0x18, // data_offset=5, flags=PSH|ACK
        0xff, 0xff, // window = 65535
        0x00, 0x00, // checksum = 0
        0x00, 0x00, // urgent_ptr = 0
    ];

    let ip_total_len = (40 + data.len()).min(usize::from(u16::MAX)) as u16;
    frame[16..18].copy_from_slice(&ip_total_len.to_be_bytes());
    frame.extend_from_slice(data);

    let d = dissect_frame(&registry, &frame);
    assert!(d.tree.check_layout(frame.len()).is_ok());
});
