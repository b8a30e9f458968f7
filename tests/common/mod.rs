//! Timestamped traffic for integration tests, built from the crate's frame builders.

#![allow(dead_code)]

use std::net::Ipv4Addr;

use frame_sniffer::{Frame, Timestamp};

pub use frame_sniffer::decode::testutil::{
    arp_frame as arp, tcp_frame_with_payload as tcp, udp_frame as udp,
};

pub const SYN: u8 = 0x02;
pub const RST: u8 = 0x04;
pub const ACK: u8 = 0x10;
pub const FIN: u8 = 0x01;

pub fn at(secs: f64, data: Vec<u8>) -> Frame {
    Frame::new(data, Timestamp::from_secs_f64(secs))
}

pub fn host(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(172, 16, 0, last)
}

/// Mixed traffic: one completed TCP connection, one half-open, UDP and ARP.
pub fn mixed_traffic() -> Vec<Frame> {
    let client = (host(10), 40000);
    let server = (host(1), 443);
    let scanner = (host(66), 51000);
    vec![
        at(1000.0, tcp(client, server, SYN, 0)),
        at(1000.1, tcp(server, client, SYN | ACK, 0)),
        at(1000.2, tcp(client, server, ACK, 500)),
        at(1000.7, arp()),
        at(1001.3, udp((host(10), 5353), (host(255), 5353), 120)),
        at(1002.0, tcp(scanner, server, SYN, 0)),
        at(1003.5, tcp(client, server, FIN | ACK, 0)),
    ]
}
