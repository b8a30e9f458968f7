use std::net::Ipv4Addr;

use serde::Serialize;

pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

const MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub ttl: u8,
    pub total_len: u16,
    /// Header length in bytes (IHL * 4).
    pub header_len: usize,
}

impl Ipv4Header {
    /// Returns the header and the offset of its payload relative to `data`.
    pub fn parse(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < MIN_HEADER_LEN {
            return None;
        }

        if (data[0] >> 4) != 4 {
            return None;
        }

        let header_len = (data[0] & 0x0F) as usize * 4;
        if header_len < MIN_HEADER_LEN || data.len() < header_len {
            return None;
        }

        let header = Self {
            src: Ipv4Addr::from(u32::from_be_bytes([data[12], data[13], data[14], data[15]])),
            dst: Ipv4Addr::from(u32::from_be_bytes([data[16], data[17], data[18], data[19]])),
            protocol: data[9],
            ttl: data[8],
            total_len: u16::from_be_bytes([data[2], data[3]]),
            header_len,
        };

        Some((header, header_len))
    }
}
