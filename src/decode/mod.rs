//! Best-effort layered decoding of raw Ethernet frames.
//!
//! Decoding never fails. A layer that cannot be parsed is left absent along
//! with everything above it, and the reason is kept in
//! [`DecodedHeaders::anomaly`] so callers can tally it.

use std::fmt;

use serde::Serialize;

use crate::connection_key::ConnectionKey;

mod ethernet;
mod ipv4;
mod transport;

pub use ethernet::{ETHERTYPE_IPV4, ETHERTYPE_VLAN, EthernetHeader};
pub use ipv4::{Ipv4Header, PROTO_TCP, PROTO_UDP};
pub use transport::{TcpFlags, TcpHeader, Transport, UdpHeader};

/// Why decoding stopped before the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeAnomaly {
    /// Shorter than an Ethernet header.
    ShortFrame,
    /// EtherType other than IPv4.
    UnsupportedEtherType(u16),
    /// IPv4 EtherType but the IP header is malformed or cut off.
    TruncatedIp,
    /// TCP or UDP announced but the header is cut off.
    TruncatedTransport(u8),
}

impl fmt::Display for DecodeAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeAnomaly::ShortFrame => write!(f, "short frame"),
            DecodeAnomaly::UnsupportedEtherType(t) => write!(f, "unsupported ethertype 0x{t:04x}"),
            DecodeAnomaly::TruncatedIp => write!(f, "truncated ipv4 header"),
            DecodeAnomaly::TruncatedTransport(p) => write!(f, "truncated transport header (proto {p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecodedHeaders {
    pub ethernet: Option<EthernetHeader>,
    pub ipv4: Option<Ipv4Header>,
    pub transport: Transport,
    pub anomaly: Option<DecodeAnomaly>,
}

impl DecodedHeaders {
    /// Connection identity, available whenever the IPv4 layer decoded.
    /// Ports are zero for traffic that is neither TCP nor UDP.
    pub fn connection_key(&self) -> Option<ConnectionKey> {
        let ip = self.ipv4.as_ref()?;
        let (src_port, dst_port) = self.transport.ports().unwrap_or((0, 0));
        Some(ConnectionKey::new(ip.src, src_port, ip.dst, dst_port))
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        self.transport.tcp()
    }
}

/// Decodes Ethernet → IPv4 → TCP/UDP as far as the bytes allow.
pub fn decode(data: &[u8]) -> DecodedHeaders {
    let mut headers = DecodedHeaders::default();

    let Some((eth, l3_offset)) = EthernetHeader::parse(data) else {
        headers.anomaly = Some(DecodeAnomaly::ShortFrame);
        return headers;
    };
    headers.ethernet = Some(eth);

    if eth.ethertype != ETHERTYPE_IPV4 {
        headers.anomaly = Some(DecodeAnomaly::UnsupportedEtherType(eth.ethertype));
        return headers;
    }

    let l3 = &data[l3_offset..];
    let Some((ip, l4_offset)) = Ipv4Header::parse(l3) else {
        headers.anomaly = Some(DecodeAnomaly::TruncatedIp);
        return headers;
    };
    headers.ipv4 = Some(ip);

    // Ethernet pads short frames; trust total_len when it is sane.
    let ip_end = match ip.total_len as usize {
        n if n >= ip.header_len && n <= l3.len() => n,
        _ => l3.len(),
    };
    let l4 = &l3[l4_offset..ip_end];

    headers.transport = match ip.protocol {
        PROTO_TCP => TcpHeader::parse(l4).map(Transport::Tcp).unwrap_or_default(),
        PROTO_UDP => UdpHeader::parse(l4).map(Transport::Udp).unwrap_or_default(),
        _ => Transport::None,
    };

    if matches!(ip.protocol, PROTO_TCP | PROTO_UDP) && headers.transport == Transport::None {
        headers.anomaly = Some(DecodeAnomaly::TruncatedTransport(ip.protocol));
    }

    headers
}

#[doc(hidden)]
pub mod testutil {
    //! Hand-built frames shared by the unit and integration tests.

    use std::net::Ipv4Addr;

    use super::{ETHERTYPE_IPV4, PROTO_TCP, PROTO_UDP};

    pub fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x02, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0x02];
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> Vec<u8> {
        let total_len = (20 + payload.len()) as u16;
        let mut ip = vec![0x45, 0];
        ip.extend_from_slice(&total_len.to_be_bytes());
        ip.extend_from_slice(&[0, 0, 0x40, 0, 64, protocol, 0, 0]);
        ip.extend_from_slice(&src.octets());
        ip.extend_from_slice(&dst.octets());
        ip.extend_from_slice(payload);
        ip
    }

    pub fn tcp(src_port: u16, dst_port: u16, seq: u32, flags: u8, checksum: u16) -> Vec<u8> {
        let mut tcp = Vec::with_capacity(20);
        tcp.extend_from_slice(&src_port.to_be_bytes());
        tcp.extend_from_slice(&dst_port.to_be_bytes());
        tcp.extend_from_slice(&seq.to_be_bytes());
        tcp.extend_from_slice(&0u32.to_be_bytes());
        tcp.push(0x50);
        tcp.push(flags);
        tcp.extend_from_slice(&1024u16.to_be_bytes());
        tcp.extend_from_slice(&checksum.to_be_bytes());
        tcp.extend_from_slice(&[0, 0]);
        tcp
    }

    pub fn udp(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
        let mut udp = Vec::new();
        udp.extend_from_slice(&src_port.to_be_bytes());
        udp.extend_from_slice(&dst_port.to_be_bytes());
        udp.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        udp.extend_from_slice(payload);
        udp
    }

    /// Ethernet/IPv4/TCP frame with the given flags.
    pub fn tcp_frame(src: (Ipv4Addr, u16), dst: (Ipv4Addr, u16), flags: u8) -> Vec<u8> {
        tcp_frame_with_payload(src, dst, flags, 0)
    }

    /// Ethernet/IPv4/TCP frame followed by `payload` filler bytes.
    pub fn tcp_frame_with_payload(
        src: (Ipv4Addr, u16),
        dst: (Ipv4Addr, u16),
        flags: u8,
        payload: usize,
    ) -> Vec<u8> {
        let mut segment = tcp(src.1, dst.1, 1000, flags, 0xbeef);
        segment.resize(segment.len() + payload, 0x5a);
        ethernet(ETHERTYPE_IPV4, &ipv4(src.0, dst.0, PROTO_TCP, &segment))
    }

    pub fn udp_frame(src: (Ipv4Addr, u16), dst: (Ipv4Addr, u16), payload: usize) -> Vec<u8> {
        let datagram = udp(src.1, dst.1, &vec![0x33; payload]);
        ethernet(ETHERTYPE_IPV4, &ipv4(src.0, dst.0, PROTO_UDP, &datagram))
    }

    pub fn arp_frame() -> Vec<u8> {
        ethernet(0x0806, &[0; 28])
    }
}
