use serde::Serialize;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;

const HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EthernetHeader {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    /// Inner EtherType after skipping one 802.1Q tag.
    pub ethertype: u16,
    pub vlan_id: Option<u16>,
}

impl EthernetHeader {
    /// Returns the header and the offset of its payload.
    pub fn parse(data: &[u8]) -> Option<(Self, usize)> {
        if data.len() < HEADER_LEN {
            return None;
        }

        let mut dst_mac = [0u8; 6];
        let mut src_mac = [0u8; 6];
        dst_mac.copy_from_slice(&data[0..6]);
        src_mac.copy_from_slice(&data[6..12]);

        let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
        let mut offset = HEADER_LEN;
        let mut vlan_id = None;

        if ethertype == ETHERTYPE_VLAN {
            if data.len() < HEADER_LEN + VLAN_TAG_LEN {
                // Tag is cut off: keep the outer header, payload unknown.
                return Some((
                    Self {
                        dst_mac,
                        src_mac,
                        ethertype,
                        vlan_id,
                    },
                    data.len(),
                ));
            }
            vlan_id = Some(u16::from_be_bytes([data[14], data[15]]) & 0x0FFF);
            ethertype = u16::from_be_bytes([data[16], data[17]]);
            offset += VLAN_TAG_LEN;
        }

        Some((
            Self {
                dst_mac,
                src_mac,
                ethertype,
                vlan_id,
            },
            offset,
        ))
    }
}
