//! Test utilities for protocol parsing.
//!
//! Provides builders for constructing test packets and helper functions
//! for validating dissection trees.

use super::{FieldNode, PortTable};

/// Builder for constructing Ethernet frames.
#[derive(Debug, Clone)]
pub struct EthernetBuilder {
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
    ethertype: u16,
    payload: Vec<u8>,
}

impl Default for EthernetBuilder {
    fn default() -> Self {
        Self {
            src_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            dst_mac: [0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            ethertype: 0x0800, // IPv4
            payload: Vec::new(),
        }
    }
}

impl EthernetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_mac(mut self, mac: [u8; 6]) -> Self {
        self.src_mac = mac;
        self
    }

    pub fn dst_mac(mut self, mac: [u8; 6]) -> Self {
        self.dst_mac = mac;
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn ipv4(self) -> Self {
        self.ethertype(0x0800)
    }

    pub fn ipv6(self) -> Self {
        self.ethertype(0x86DD)
    }

    pub fn arp(self) -> Self {
        self.ethertype(0x0806)
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(14 + self.payload.len());
        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

/// Builder for ARP packets with arbitrary address lengths.
#[derive(Debug, Clone)]
pub struct ArpBuilder {
    hardware_type: u16,
    protocol_type: u16,
    operation: u16,
    sender_hw: Vec<u8>,
    sender_proto: Vec<u8>,
    target_hw: Vec<u8>,
    target_proto: Vec<u8>,
}

impl Default for ArpBuilder {
    fn default() -> Self {
        Self {
            hardware_type: 1,
            protocol_type: 0x0800,
            operation: 1,
            sender_hw: vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            sender_proto: vec![192, 168, 1, 1],
            target_hw: vec![0; 6],
            target_proto: vec![192, 168, 1, 2],
        }
    }
}

impl ArpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operation(mut self, op: u16) -> Self {
        self.operation = op;
        self
    }

    pub fn protocol_type(mut self, protocol_type: u16) -> Self {
        self.protocol_type = protocol_type;
        self
    }

    pub fn protocol_addrs(mut self, sender: &[u8], target: &[u8]) -> Self {
        self.sender_proto = sender.to_vec();
        self.target_proto = target.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pkt = Vec::new();
        pkt.extend_from_slice(&self.hardware_type.to_be_bytes());
        pkt.extend_from_slice(&self.protocol_type.to_be_bytes());
        pkt.push(self.sender_hw.len() as u8);
        pkt.push(self.sender_proto.len() as u8);
        pkt.extend_from_slice(&self.operation.to_be_bytes());
        pkt.extend_from_slice(&self.sender_hw);
        pkt.extend_from_slice(&self.sender_proto);
        pkt.extend_from_slice(&self.target_hw);
        pkt.extend_from_slice(&self.target_proto);
        pkt
    }
}

/// Builder for constructing IPv4 headers.
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    tos: u8,
    identification: u16,
    flags_fragment: u16,
    ttl: u8,
    protocol: u8,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    options: Vec<u8>,
    ihl_override: Option<u8>,
    payload: Vec<u8>,
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self {
            tos: 0x00,
            identification: 0x0001,
            flags_fragment: 0x4000, // DF
            ttl: 64,
            protocol: 6, // TCP
            src_ip: [192, 168, 1, 1],
            dst_ip: [192, 168, 1, 2],
            options: Vec::new(),
            ihl_override: None,
            payload: Vec::new(),
        }
    }
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn src(mut self, ip: [u8; 4]) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst(mut self, ip: [u8; 4]) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn flags_fragment(mut self, value: u16) -> Self {
        self.flags_fragment = value;
        self
    }

    /// Options bytes; padded to a 4-byte multiple on build.
    pub fn options(mut self, options: Vec<u8>) -> Self {
        self.options = options;
        self
    }

    /// Force the IHL nibble regardless of options.
    pub fn ihl(mut self, ihl: u8) -> Self {
        self.ihl_override = Some(ihl);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut options = self.options;
        while options.len() % 4 != 0 {
            options.push(0);
        }
        let header_len = 20 + options.len();
        let ihl = self.ihl_override.unwrap_or((header_len / 4) as u8);
        let total_len = (header_len + self.payload.len()) as u16;

        let mut pkt = Vec::with_capacity(total_len as usize);
        pkt.push(0x40 | (ihl & 0x0f));
        pkt.push(self.tos);
        pkt.extend_from_slice(&total_len.to_be_bytes());
        pkt.extend_from_slice(&self.identification.to_be_bytes());
        pkt.extend_from_slice(&self.flags_fragment.to_be_bytes());
        pkt.push(self.ttl);
        pkt.push(self.protocol);
        pkt.extend_from_slice(&[0x00, 0x00]); // checksum
        pkt.extend_from_slice(&self.src_ip);
        pkt.extend_from_slice(&self.dst_ip);
        pkt.extend_from_slice(&options);
        pkt.extend_from_slice(&self.payload);
        pkt
    }
}

/// Builder for constructing IPv6 headers.
#[derive(Debug, Clone)]
pub struct Ipv6Builder {
    traffic_class: u8,
    flow_label: u32,
    next_header: u8,
    hop_limit: u8,
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
    payload: Vec<u8>,
}

impl Default for Ipv6Builder {
    fn default() -> Self {
        let mut src_ip = [0u8; 16];
        src_ip[..2].copy_from_slice(&[0x20, 0x01]);
        src_ip[15] = 1;
        let mut dst_ip = src_ip;
        dst_ip[15] = 2;
        Self {
            traffic_class: 0,
            flow_label: 0,
            next_header: 6,
            hop_limit: 64,
            src_ip,
            dst_ip,
            payload: Vec::new(),
        }
    }
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traffic_class(mut self, tc: u8) -> Self {
        self.traffic_class = tc;
        self
    }

    pub fn flow_label(mut self, label: u32) -> Self {
        self.flow_label = label & 0x000f_ffff;
        self
    }

    pub fn next_header(mut self, nh: u8) -> Self {
        self.next_header = nh;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let word = (6u32 << 28) | (u32::from(self.traffic_class) << 20) | self.flow_label;
        let mut pkt = Vec::with_capacity(40 + self.payload.len());
        pkt.extend_from_slice(&word.to_be_bytes());
        pkt.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        pkt.push(self.next_header);
        pkt.push(self.hop_limit);
        pkt.extend_from_slice(&self.src_ip);
        pkt.extend_from_slice(&self.dst_ip);
        pkt.extend_from_slice(&self.payload);
        pkt
    }
}

/// Builder for constructing TCP segments.
#[derive(Debug, Clone)]
pub struct TcpBuilder {
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: u8,
    window: u16,
    options: Vec<u8>,
    data_offset_override: Option<u8>,
    payload: Vec<u8>,
}

impl Default for TcpBuilder {
    fn default() -> Self {
        Self {
            src_port: 40000,
            dst_port: 179,
            seq: 1,
            ack: 0,
            flags: 0x18, // PSH|ACK
            window: 65535,
            options: Vec::new(),
            data_offset_override: None,
            payload: Vec::new(),
        }
    }
}

impl TcpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(mut self, src: u16, dst: u16) -> Self {
        self.src_port = src;
        self.dst_port = dst;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    /// Raw options bytes; padded with EOL to a 4-byte multiple on build.
    pub fn options(mut self, options: Vec<u8>) -> Self {
        self.options = options;
        self
    }

    /// Force the data offset nibble regardless of options.
    pub fn data_offset(mut self, words: u8) -> Self {
        self.data_offset_override = Some(words);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut options = self.options;
        while options.len() % 4 != 0 {
            options.push(0);
        }
        let words = self
            .data_offset_override
            .unwrap_or(((20 + options.len()) / 4) as u8);

        let mut seg = Vec::with_capacity(20 + options.len() + self.payload.len());
        seg.extend_from_slice(&self.src_port.to_be_bytes());
        seg.extend_from_slice(&self.dst_port.to_be_bytes());
        seg.extend_from_slice(&self.seq.to_be_bytes());
        seg.extend_from_slice(&self.ack.to_be_bytes());
        seg.push(words << 4);
        seg.push(self.flags);
        seg.extend_from_slice(&self.window.to_be_bytes());
        seg.extend_from_slice(&[0x00, 0x00]); // checksum
        seg.extend_from_slice(&[0x00, 0x00]); // urgent pointer
        seg.extend_from_slice(&options);
        seg.extend_from_slice(&self.payload);
        seg
    }
}

/// Builder for constructing UDP datagrams.
#[derive(Debug, Clone)]
pub struct UdpBuilder {
    src_port: u16,
    dst_port: u16,
    payload: Vec<u8>,
}

impl Default for UdpBuilder {
    fn default() -> Self {
        Self {
            src_port: 40000,
            dst_port: 53,
            payload: Vec::new(),
        }
    }
}

impl UdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(mut self, src: u16, dst: u16) -> Self {
        self.src_port = src;
        self.dst_port = dst;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let len = (8 + self.payload.len()) as u16;
        let mut dgram = Vec::with_capacity(len as usize);
        dgram.extend_from_slice(&self.src_port.to_be_bytes());
        dgram.extend_from_slice(&self.dst_port.to_be_bytes());
        dgram.extend_from_slice(&len.to_be_bytes());
        dgram.extend_from_slice(&[0x00, 0x00]);
        dgram.extend_from_slice(&self.payload);
        dgram
    }
}

/// Builder for BGP messages: a header wrapped around a body.
#[derive(Debug, Clone)]
pub struct BgpBuilder {
    marker: [u8; 16],
    msg_type: u8,
    length_override: Option<u16>,
    body: Vec<u8>,
}

impl BgpBuilder {
    pub fn new(msg_type: u8) -> Self {
        Self {
            marker: [0xff; 16],
            msg_type,
            length_override: None,
            body: Vec::new(),
        }
    }

    pub fn keepalive() -> Self {
        Self::new(4)
    }

    /// OPEN with 2-byte AS, hold time, identifier and raw optional parameters.
    pub fn open(my_as: u16, hold_time: u16, bgp_id: [u8; 4], opt_params: &[u8]) -> Self {
        let mut body = vec![4];
        body.extend_from_slice(&my_as.to_be_bytes());
        body.extend_from_slice(&hold_time.to_be_bytes());
        body.extend_from_slice(&bgp_id);
        body.push(opt_params.len() as u8);
        body.extend_from_slice(opt_params);
        Self::new(1).body(body)
    }

    /// UPDATE from raw withdrawn routes, path attributes and NLRI sections.
    pub fn update(withdrawn: &[u8], attrs: &[u8], nlri: &[u8]) -> Self {
        let mut body = Vec::new();
        body.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        body.extend_from_slice(withdrawn);
        body.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        body.extend_from_slice(attrs);
        body.extend_from_slice(nlri);
        Self::new(2).body(body)
    }

    pub fn notification(code: u8, subcode: u8, data: &[u8]) -> Self {
        let mut body = vec![code, subcode];
        body.extend_from_slice(data);
        Self::new(3).body(body)
    }

    pub fn route_refresh(afi: u16, subtype: u8, safi: u8) -> Self {
        let mut body = afi.to_be_bytes().to_vec();
        body.push(subtype);
        body.push(safi);
        Self::new(5).body(body)
    }

    pub fn marker(mut self, marker: [u8; 16]) -> Self {
        self.marker = marker;
        self
    }

    /// Declare a length different from the real one.
    pub fn length(mut self, length: u16) -> Self {
        self.length_override = Some(length);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let length = self
            .length_override
            .unwrap_or((19 + self.body.len()) as u16);
        let mut msg = Vec::with_capacity(19 + self.body.len());
        msg.extend_from_slice(&self.marker);
        msg.extend_from_slice(&length.to_be_bytes());
        msg.push(self.msg_type);
        msg.extend_from_slice(&self.body);
        msg
    }
}

/// Capability TLV wrapped in an OPEN optional parameter of type 2.
pub fn capability_param(code: u8, value: &[u8]) -> Vec<u8> {
    let mut param = vec![2, (value.len() + 2) as u8, code, value.len() as u8];
    param.extend_from_slice(value);
    param
}

/// Empty port table for parsers that don't resolve ports.
pub fn no_ports() -> PortTable {
    PortTable::new()
}

/// Assert the tree layout invariant, printing the offending node on failure.
pub fn assert_layout(tree: &FieldNode, buf_len: usize) {
    if let Err(e) = tree.check_layout(buf_len) {
        panic!("layout violation: {e}\ntree: {tree:#?}");
    }
}

/// Child names of a node, for compact assertions.
pub fn child_names(node: &FieldNode) -> Vec<&str> {
    node.children.iter().map(|c| c.name.as_str()).collect()
}

/// Text or numeric value of the first node named `name`, rendered as a string.
pub fn value_of(tree: &FieldNode, name: &str) -> Option<String> {
    tree.find(name).map(|n| n.value.to_string())
}
