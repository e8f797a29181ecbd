//! Display formatting for wire values.

mod address;

pub use address::{
    format_hw_address, format_ipv4, format_ipv6, format_ipv6_full, format_mac,
    format_prefix_v4,
};
