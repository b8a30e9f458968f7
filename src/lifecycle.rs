//! TCP connection lifecycle tracking.
//!
//! Each directional key moves through `NoState → SynSeen → Completed`:
//!
//! - a SYN without ACK opens (or restarts) the timer,
//! - FIN or RST on an open key closes it with a measured duration,
//! - Completed is terminal.
//!
//! Every frame that changes nothing is tallied as ignored. Keys still open
//! when the session ends are half-open connections; their start times bound
//! the anomaly window.

use std::collections::HashMap;

use serde::Serialize;

use crate::connection_key::ConnectionKey;
use crate::decode::TcpFlags;
use crate::frame::Timestamp;

/// Display duration for connections still open at session end.
pub const DEFAULT_INCOMPLETE_SENTINEL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ConnectionState {
    NoState,
    SynSeen { start: Timestamp },
    Completed { start: Timestamp, duration: f64 },
}

/// Effect of one frame on the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Opened,
    Restarted,
    Completed,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Completed,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionTimeline {
    pub key: ConnectionKey,
    pub start_time: Timestamp,
    /// Measured for completed connections, the sentinel otherwise.
    pub duration: f64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnomalyWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl AnomalyWindow {
    pub fn duration(&self) -> f64 {
        self.end.seconds_since(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleReport {
    pub syn_count: u64,
    pub completed_count: usize,
    pub incomplete_count: usize,
    pub ignored_count: u64,
    pub connections: Vec<ConnectionTimeline>,
    pub anomaly_window: Option<AnomalyWindow>,
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    state: ConnectionState,
    first_seen: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleTracker {
    states: HashMap<ConnectionKey, Tracked>,
    next_ordinal: u64,
    syn_count: u64,
    ignored: u64,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, key: ConnectionKey, flags: TcpFlags, ts: Timestamp) -> Transition {
        let opening = flags.syn() && !flags.ack();
        let closing = flags.fin() || flags.rst();
        if opening {
            self.syn_count += 1;
        }

        let transition = if let Some(tracked) = self.states.get_mut(&key) {
            match tracked.state {
                ConnectionState::SynSeen { .. } if opening => {
                    // Last SYN wins.
                    tracked.state = ConnectionState::SynSeen { start: ts };
                    Transition::Restarted
                }
                ConnectionState::SynSeen { start } if closing => {
                    tracked.state = ConnectionState::Completed {
                        start,
                        duration: ts.seconds_since(start),
                    };
                    Transition::Completed
                }
                _ => Transition::Ignored,
            }
        } else if opening {
            let first_seen = self.next_ordinal;
            self.next_ordinal += 1;
            self.states.insert(
                key,
                Tracked {
                    state: ConnectionState::SynSeen { start: ts },
                    first_seen,
                },
            );
            Transition::Opened
        } else {
            Transition::Ignored
        };

        if transition == Transition::Ignored {
            self.ignored += 1;
        }
        transition
    }

    /// Counts a frame that carried no TCP header.
    pub fn ignore(&mut self) {
        self.ignored += 1;
    }

    pub fn state(&self, key: &ConnectionKey) -> ConnectionState {
        self.states
            .get(key)
            .map_or(ConnectionState::NoState, |tracked| tracked.state)
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Timeline ordered by start time, plus the half-open anomaly window.
    pub fn report(&self, incomplete_sentinel: f64) -> LifecycleReport {
        let mut ordered: Vec<(u64, ConnectionTimeline)> = self
            .states
            .iter()
            .filter_map(|(key, tracked)| {
                let timeline = match tracked.state {
                    ConnectionState::NoState => return None,
                    ConnectionState::SynSeen { start } => ConnectionTimeline {
                        key: *key,
                        start_time: start,
                        duration: incomplete_sentinel,
                        outcome: Outcome::Incomplete,
                    },
                    ConnectionState::Completed { start, duration } => ConnectionTimeline {
                        key: *key,
                        start_time: start,
                        duration,
                        outcome: Outcome::Completed,
                    },
                };
                Some((tracked.first_seen, timeline))
            })
            .collect();
        ordered.sort_by(|(a_seen, a), (b_seen, b)| {
            a.start_time.cmp(&b.start_time).then(a_seen.cmp(b_seen))
        });

        let connections: Vec<ConnectionTimeline> =
            ordered.into_iter().map(|(_, timeline)| timeline).collect();

        let mut incomplete = connections
            .iter()
            .filter(|c| c.outcome == Outcome::Incomplete)
            .map(|c| c.start_time);
        let anomaly_window = incomplete.next().map(|first| AnomalyWindow {
            start: first,
            end: incomplete.last().unwrap_or(first),
        });

        let incomplete_count = connections
            .iter()
            .filter(|c| c.outcome == Outcome::Incomplete)
            .count();

        LifecycleReport {
            syn_count: self.syn_count,
            completed_count: connections.len() - incomplete_count,
            incomplete_count,
            ignored_count: self.ignored,
            connections,
            anomaly_window,
        }
    }
}
