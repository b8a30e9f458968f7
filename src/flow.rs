use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::connection_key::{ConnectionKey, Endpoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowRecord {
    pub bytes: u64,
    pub packets: u64,
    /// Position of the key in first-observed order; breaks volume ties.
    pub first_seen: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowEntry {
    pub key: ConnectionKey,
    pub bytes: u64,
    pub packets: u64,
}

/// Cumulative traffic per directional connection key.
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    flows: HashMap<ConnectionKey, FlowRecord>,
    next_ordinal: u64,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: ConnectionKey, length: usize) {
        match self.flows.entry(key) {
            Entry::Occupied(mut entry) => {
                let flow = entry.get_mut();
                flow.bytes += length as u64;
                flow.packets += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(FlowRecord {
                    bytes: length as u64,
                    packets: 1,
                    first_seen: self.next_ordinal,
                });
                self.next_ordinal += 1;
            }
        }
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<&FlowRecord> {
        self.flows.get(key)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Flow with the most bytes; the earliest observed key wins a tie.
    pub fn top_by_volume(&self) -> Option<FlowEntry> {
        self.flows
            .iter()
            .max_by(|(_, a), (_, b)| {
                a.bytes
                    .cmp(&b.bytes)
                    .then_with(|| b.first_seen.cmp(&a.first_seen))
            })
            .map(|(key, flow)| FlowEntry {
                key: *key,
                bytes: flow.bytes,
                packets: flow.packets,
            })
    }

    /// Unique (source host, destination host) pairs, ports ignored.
    pub fn distinct_endpoint_pairs(&self) -> BTreeSet<(Ipv4Addr, Ipv4Addr)> {
        self.flows
            .keys()
            .map(|key| (key.src_ip, key.dst_ip))
            .collect()
    }

    pub fn distinct_pair_count(&self) -> usize {
        self.distinct_endpoint_pairs().len()
    }

    /// All flows, largest first, ties in first-observed order.
    pub fn flows(&self) -> Vec<FlowEntry> {
        let mut records: Vec<(&ConnectionKey, &FlowRecord)> = self.flows.iter().collect();
        records.sort_by(|(_, a), (_, b)| {
            b.bytes
                .cmp(&a.bytes)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        });
        records
            .into_iter()
            .map(|(key, flow)| FlowEntry {
                key: *key,
                bytes: flow.bytes,
                packets: flow.packets,
            })
            .collect()
    }

    /// Packets sent per source endpoint.
    pub fn per_source(&self) -> BTreeMap<Endpoint, u64> {
        self.tally(|key| key.source())
    }

    /// Packets received per destination endpoint.
    pub fn per_destination(&self) -> BTreeMap<Endpoint, u64> {
        self.tally(|key| key.destination())
    }

    fn tally(&self, side: impl Fn(&ConnectionKey) -> Endpoint) -> BTreeMap<Endpoint, u64> {
        let mut out = BTreeMap::new();
        for (key, flow) in &self.flows {
            *out.entry(side(key)).or_insert(0) += flow.packets;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(last: u8, port: u16) -> ConnectionKey {
        ConnectionKey::new(
            Ipv4Addr::new(10, 0, 0, last),
            port,
            Ipv4Addr::new(10, 0, 0, 100),
            80,
        )
    }

    #[test]
    fn test_top_flow_changes_with_volume() {
        let k = key(1, 1000);
        let m = key(2, 2000);
        let mut table = FlowTable::new();

        for len in [100, 200, 50] {
            table.record(k, len);
        }
        let top = table.top_by_volume().unwrap();
        assert_eq!(top.key, k);
        assert_eq!(top.bytes, 350);
        assert_eq!(top.packets, 3);

        table.record(m, 500);
        let top = table.top_by_volume().unwrap();
        assert_eq!(top.key, m);
        assert_eq!(top.bytes, 500);
    }

    #[test]
    fn test_tie_goes_to_first_observed() {
        let mut table = FlowTable::new();
        // Insert many keys so hash iteration order is unlikely to match insertion.
        for port in (1..=64).rev() {
            table.record(key(9, port), 10);
        }
        assert_eq!(table.top_by_volume().unwrap().key, key(9, 64));
        assert_eq!(table.flows()[0].key, key(9, 64));
        assert_eq!(table.flows()[63].key, key(9, 1));
    }

    #[test]
    fn test_totals_equal_sum_of_lengths() {
        let mut table = FlowTable::new();
        let frames = [(key(1, 1), 60), (key(2, 2), 70), (key(1, 1), 80)];
        for (k, len) in frames {
            table.record(k, len);
        }
        let total: u64 = table.flows().iter().map(|f| f.bytes).sum();
        assert_eq!(total, 210);
        assert_eq!(table.get(&key(1, 1)).unwrap().bytes, 140);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_distinct_pairs_ignore_ports() {
        let mut table = FlowTable::new();
        table.record(key(1, 1000), 1);
        table.record(key(1, 1001), 1);
        table.record(key(2, 1000), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.distinct_pair_count(), 2);
    }

    #[test]
    fn test_per_endpoint_tallies() {
        let mut table = FlowTable::new();
        table.record(key(1, 1000), 1);
        table.record(key(1, 1000), 1);
        table.record(key(2, 1000), 1);

        let sources = table.per_source();
        assert_eq!(sources[&key(1, 1000).source()], 2);
        assert_eq!(sources[&key(2, 1000).source()], 1);

        let destinations = table.per_destination();
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[&key(1, 1000).destination()], 3);
    }

    #[test]
    fn test_empty_table_has_no_top() {
        assert!(FlowTable::new().top_by_volume().is_none());
    }
}
