use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Arrival time of a frame, microsecond resolution since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Timestamp {
    pub secs: u64,
    pub micros: u32,
}

impl Timestamp {
    pub fn new(secs: u64, micros: u32) -> Self {
        // Normalize so that micros always stays below one second.
        let carry = micros as u64 / MICROS_PER_SEC;
        Self {
            secs: secs + carry,
            micros: (micros as u64 % MICROS_PER_SEC) as u32,
        }
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        let secs = secs.max(0.0);
        let whole = secs.trunc();
        let micros = ((secs - whole) * MICROS_PER_SEC as f64).round() as u32;
        Self::new(whole as u64, micros)
    }

    pub fn now() -> Self {
        SystemTime::now().into()
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.micros as f64 / MICROS_PER_SEC as f64
    }

    pub fn as_micros(&self) -> u64 {
        self.secs * MICROS_PER_SEC + self.micros as u64
    }

    /// Seconds elapsed since `earlier`; zero when `earlier` is in the future.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        self.as_micros().saturating_sub(earlier.as_micros()) as f64 / MICROS_PER_SEC as f64
    }
}

impl From<SystemTime> for Timestamp {
    fn from(value: SystemTime) -> Self {
        value.duration_since(UNIX_EPOCH).unwrap_or_default().into()
    }
}

/// Offset from the Unix epoch; sub-microsecond digits are dropped.
impl From<Duration> for Timestamp {
    fn from(since: Duration) -> Self {
        Self::new(since.as_secs(), since.subsec_micros())
    }
}

impl From<Timestamp> for Duration {
    fn from(ts: Timestamp) -> Self {
        Duration::new(ts.secs, ts.micros * 1_000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs, self.micros)
    }
}

/// One captured link-layer unit.
///
/// `data` holds the captured bytes; `orig_len` is the length on the wire,
/// which exceeds `data.len()` only when the capture was truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    timestamp: Timestamp,
    orig_len: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, timestamp: Timestamp) -> Self {
        let orig_len = data.len();
        Self {
            data,
            timestamp,
            orig_len,
        }
    }

    pub fn with_orig_len(data: Vec<u8>, timestamp: Timestamp, orig_len: usize) -> Self {
        let orig_len = orig_len.max(data.len());
        Self {
            data,
            timestamp,
            orig_len,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Wire length, used for every byte counter.
    pub fn len(&self) -> usize {
        self.orig_len
    }

    pub fn captured_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orig_len == 0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
