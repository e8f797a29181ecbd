//! Network address formatting.
//!
//! Field values are rendered for people reading a dissection, so the
//! formats follow packet-analyzer conventions: MACs in uppercase colon hex,
//! IPv4 in dotted decimal, IPv6 either compressed or in full groups.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Format 4 bytes as a dotted-decimal IPv4 address.
///
/// Returns `None` if the slice is not exactly 4 bytes.
///
/// # Example
///
/// ```
/// use pktscope_core::format::format_ipv4;
///
/// assert_eq!(format_ipv4(&[192, 168, 1, 1]), Some("192.168.1.1".to_string()));
/// assert_eq!(format_ipv4(&[10, 0, 0]), None);
/// ```
pub fn format_ipv4(bytes: &[u8]) -> Option<String> {
    let octets: [u8; 4] = bytes.try_into().ok()?;
    Some(Ipv4Addr::from(octets).to_string())
}

/// Format 16 bytes as a compressed IPv6 address string.
///
/// # Example
///
/// ```
/// use pktscope_core::format::format_ipv6;
///
/// let bytes = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
/// assert_eq!(format_ipv6(&bytes), Some("2001:db8::1".to_string()));
/// ```
pub fn format_ipv6(bytes: &[u8]) -> Option<String> {
    let octets: [u8; 16] = bytes.try_into().ok()?;
    Some(Ipv6Addr::from(octets).to_string())
}

/// Format 16 bytes as eight colon-separated, zero-padded hex groups.
///
/// # Example
///
/// ```
/// use pktscope_core::format::format_ipv6_full;
///
/// let bytes = [0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
/// assert_eq!(
///     format_ipv6_full(&bytes),
///     Some("2001:0db8:0000:0000:0000:0000:0000:0001".to_string())
/// );
/// ```
pub fn format_ipv6_full(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 16 {
        return None;
    }
    let groups: Vec<String> = bytes
        .chunks_exact(2)
        .map(|g| format!("{:04x}", u16::from_be_bytes([g[0], g[1]])))
        .collect();
    Some(groups.join(":"))
}

/// Format 6 bytes as an uppercase, colon-separated MAC address.
///
/// # Example
///
/// ```
/// use pktscope_core::format::format_mac;
///
/// let bytes = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
/// assert_eq!(format_mac(&bytes), Some("AA:BB:CC:DD:EE:FF".to_string()));
/// ```
pub fn format_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    Some(format_hw_address(bytes))
}

/// Format a hardware address of any length as uppercase colon hex.
pub fn format_hw_address(bytes: &[u8]) -> String {
    let parts: Vec<String> = bytes.iter().map(|b| format!("{b:02X}")).collect();
    parts.join(":")
}

/// Format a BGP-style IPv4 prefix: `bits` of address carried in
/// `ceil(bits / 8)` wire bytes, zero-extended to four octets.
///
/// Bits past the prefix length in the last carried octet are masked off.
///
/// # Example
///
/// ```
/// use pktscope_core::format::format_prefix_v4;
///
/// assert_eq!(format_prefix_v4(&[10, 0, 0], 24), "10.0.0.0");
/// assert_eq!(format_prefix_v4(&[172, 31], 12), "172.16.0.0");
/// assert_eq!(format_prefix_v4(&[], 0), "0.0.0.0");
/// ```
pub fn format_prefix_v4(bytes: &[u8], bits: u8) -> String {
    let mut octets = [0u8; 4];
    let n = bytes.len().min(4);
    octets[..n].copy_from_slice(&bytes[..n]);

    let bits = u32::from(bits.min(32));
    let mask = if bits == 0 {
        0
    } else {
        u32::MAX << (32 - bits)
    };
    Ipv4Addr::from(u32::from_be_bytes(octets) & mask).to_string()
}
