use serde::Serialize;

use crate::frame::Timestamp;

/// Default floor for the rate window, in seconds.
pub const DEFAULT_MIN_RATE_WINDOW: f64 = 1.0;

const BITS_PER_MEGABIT: f64 = 1024.0 * 1024.0;

/// Instantaneous rates captured when a whole second of session time elapses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSample {
    /// Whole seconds since the window start.
    pub second: u64,
    pub pps: f64,
    pub mbps: f64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub packet_count: u64,
    pub byte_count: u64,
    pub elapsed_seconds: f64,
    pub avg_pps: f64,
    pub avg_mbps: f64,
    pub peak_pps: f64,
    pub peak_mbps: f64,
    pub min_frame_len: Option<usize>,
    pub max_frame_len: Option<usize>,
    pub avg_frame_len: f64,
}

/// Running totals and peak trackers, O(1) per frame.
///
/// Rates are cumulative over one running window that starts at the first
/// frame (or at [`TrafficStats::begin`]). The window length used as the
/// divisor never drops below `min_window`.
#[derive(Debug, Clone)]
pub struct TrafficStats {
    packets: u64,
    bytes: u64,
    window_start: Option<Timestamp>,
    last_seen: Option<Timestamp>,
    min_window: f64,
    last_second: u64,
    pps: f64,
    mbps: f64,
    peak_pps: f64,
    peak_mbps: f64,
    min_len: Option<usize>,
    max_len: Option<usize>,
}

impl Default for TrafficStats {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RATE_WINDOW)
    }
}

impl TrafficStats {
    pub fn new(min_window: f64) -> Self {
        Self {
            packets: 0,
            bytes: 0,
            window_start: None,
            last_seen: None,
            min_window: min_window.max(0.0),
            last_second: 0,
            pps: 0.0,
            mbps: 0.0,
            peak_pps: 0.0,
            peak_mbps: 0.0,
            min_len: None,
            max_len: None,
        }
    }

    /// Pins the window start; only the first call has any effect.
    pub fn begin(&mut self, now: Timestamp) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
            self.last_seen = Some(now);
        }
    }

    /// Counts one frame. Returns a sample when a new whole second began.
    pub fn record(&mut self, length: usize, now: Timestamp) -> Option<RateSample> {
        self.begin(now);
        self.mark(now);

        self.packets += 1;
        self.bytes += length as u64;
        self.min_len = Some(self.min_len.map_or(length, |m| m.min(length)));
        self.max_len = Some(self.max_len.map_or(length, |m| m.max(length)));

        let elapsed = self.elapsed();
        let (pps, mbps) = self.rates_over(elapsed);
        self.pps = pps;
        self.mbps = mbps;
        self.peak_pps = self.peak_pps.max(pps);
        self.peak_mbps = self.peak_mbps.max(mbps);

        let second = elapsed.floor() as u64;
        if second > self.last_second {
            self.last_second = second;
            return Some(RateSample {
                second,
                pps,
                mbps,
                timestamp: now,
            });
        }
        None
    }

    /// Advances the session clock without counting a frame.
    pub fn mark(&mut self, now: Timestamp) {
        if self.window_start.is_none() {
            return;
        }
        if self.last_seen.is_none_or(|last| now > last) {
            self.last_seen = Some(now);
        }
    }

    pub fn elapsed(&self) -> f64 {
        match (self.window_start, self.last_seen) {
            (Some(start), Some(last)) => last.seconds_since(start),
            _ => 0.0,
        }
    }

    pub fn window_start(&self) -> Option<Timestamp> {
        self.window_start
    }

    pub fn current_pps(&self) -> f64 {
        self.pps
    }

    pub fn current_mbps(&self) -> f64 {
        self.mbps
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed = self.elapsed();
        let (avg_pps, avg_mbps) = self.rates_over(elapsed);
        let avg_frame_len = if self.packets == 0 {
            0.0
        } else {
            self.bytes as f64 / self.packets as f64
        };

        StatsSnapshot {
            packet_count: self.packets,
            byte_count: self.bytes,
            elapsed_seconds: elapsed,
            avg_pps,
            avg_mbps,
            peak_pps: self.peak_pps,
            peak_mbps: self.peak_mbps,
            min_frame_len: self.min_len,
            max_frame_len: self.max_len,
            avg_frame_len,
        }
    }

    fn rates_over(&self, elapsed: f64) -> (f64, f64) {
        let window = elapsed.max(self.min_window);
        // Only reachable with a zero floor at the very first frame.
        if window <= 0.0 {
            return (0.0, 0.0);
        }
        let pps = self.packets as f64 / window;
        let mbps = (self.bytes as f64 * 8.0) / BITS_PER_MEGABIT / window;
        (pps, mbps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: f64) -> Timestamp {
        Timestamp::from_secs_f64(1_000.0 + secs)
    }

    #[test]
    fn test_totals_match_input() {
        let mut stats = TrafficStats::default();
        let lengths = [60usize, 1514, 42, 900, 0, 64];
        for (i, len) in lengths.iter().enumerate() {
            stats.record(*len, ts(i as f64 * 0.3));
        }
        let snap = stats.snapshot();
        assert_eq!(snap.packet_count, lengths.len() as u64);
        assert_eq!(snap.byte_count, lengths.iter().sum::<usize>() as u64);
        assert_eq!(snap.min_frame_len, Some(0));
        assert_eq!(snap.max_frame_len, Some(1514));
    }

    #[test]
    fn test_peaks_dominate_every_instantaneous_rate() {
        let mut stats = TrafficStats::default();
        let mut seen_pps = Vec::new();
        let mut seen_mbps = Vec::new();
        // Bursty: dense first second, then sparse.
        let mut t = 0.0;
        for i in 0..200 {
            t += if i < 100 { 0.005 } else { 0.2 };
            stats.record(1000, ts(t));
            seen_pps.push(stats.current_pps());
            seen_mbps.push(stats.current_mbps());

            let snap = stats.snapshot();
            assert!(seen_pps.iter().all(|p| snap.peak_pps >= *p));
            assert!(seen_mbps.iter().all(|m| snap.peak_mbps >= *m));
        }
    }

    #[test]
    fn test_peaks_never_decrease() {
        let mut stats = TrafficStats::default();
        let mut last_peak = 0.0;
        for i in 0..50 {
            stats.record(100, ts(i as f64 * i as f64 * 0.01));
            let peak = stats.snapshot().peak_pps;
            assert!(peak >= last_peak);
            last_peak = peak;
        }
    }

    #[test]
    fn test_first_frame_does_not_divide_by_zero() {
        let mut stats = TrafficStats::new(0.0);
        stats.record(100, ts(0.0));
        let snap = stats.snapshot();
        assert_eq!(snap.elapsed_seconds, 0.0);
        assert!(snap.avg_pps.is_finite());
        assert!(snap.peak_pps.is_finite());
    }

    #[test]
    fn test_sample_emitted_once_per_second_boundary() {
        let mut stats = TrafficStats::default();
        let samples: Vec<_> = [0.0, 0.5, 1.1, 1.9, 2.0, 4.5]
            .iter()
            .filter_map(|s| stats.record(10, ts(*s)))
            .map(|sample| sample.second)
            .collect();
        assert_eq!(samples, vec![1, 2, 4]);
    }

    #[test]
    fn test_megabits_use_binary_megabit() {
        let mut stats = TrafficStats::default();
        stats.record(131_072, ts(0.0));
        stats.record(0, ts(1.0));
        // 131072 bytes * 8 = 1 Mibit over one second
        assert_eq!(stats.snapshot().avg_mbps, 1.0);
    }

    #[test]
    fn test_mark_extends_elapsed_without_counting() {
        let mut stats = TrafficStats::default();
        stats.begin(ts(0.0));
        stats.record(500, ts(1.0));
        stats.mark(ts(10.0));
        let snap = stats.snapshot();
        assert_eq!(snap.packet_count, 1);
        assert_eq!(snap.elapsed_seconds, 10.0);
        assert_eq!(snap.avg_pps, 0.1);
    }
}
