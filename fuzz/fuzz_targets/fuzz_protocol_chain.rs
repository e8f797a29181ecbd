//! Fuzz target for the protocol parsing chain.
//!
//! Main entry point for arbitrary bytes. Tests:
//! - Header bounds checking in each parser
//! - Next-layer hints and chaining
//! - Tree layout (offsets inside the buffer, ordered children)
//! - Every start layer

#![no_main]

use libfuzzer_sys::fuzz_target;
use pktscope_core::{default_registry, dissect, StartLayer};

const START_LAYERS: [StartLayer; 5] = [
    StartLayer::Ethernet,
    StartLayer::Ip,
    StartLayer::Tcp,
    StartLayer::Udp,
    StartLayer::Bgp,
];

fuzz_target!(|data: &[u8]| {
    let registry = default_registry();
    // keep a port bound so the dynamic lookup path runs too
    registry.register_protocol_port("bgp", 0x5050);

    for start in START_LAYERS {
        let d = dissect(&registry, data, 0, start);
        if let Err(e) = d.tree.check_layout(data.len()) {
            panic!("{start:?}: {e}");
        }
        // dissection is deterministic
        assert_eq!(d, dissect(&registry, data, 0, start));
    }
});
