//! Post-capture reports: serializable structs plus text panels.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::connection_key::Endpoint;
use crate::flow::FlowEntry;
use crate::frame::Timestamp;
use crate::lifecycle::{LifecycleReport, Outcome};
use crate::session::HaltReason;
use crate::stats::{HistogramBucket, StatsSnapshot};

const RULE: &str = "---------------------------------------------------------------------";
const DOUBLE_RULE: &str = "=====================================================================";
const BAR_WIDTH: u64 = 40;

/// Local wall-clock time of a capture timestamp, `HH:MM:SS`.
pub fn format_clock(ts: Timestamp) -> String {
    let secs = i64::try_from(ts.secs).unwrap_or(i64::MAX);
    DateTime::from_timestamp(secs, ts.micros * 1_000)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub started_at: Option<Timestamp>,
    /// Frames counted but not decodable down to the transport layer.
    pub undecoded_frames: u64,
    pub archived_frames: u64,
    pub writer_failures: u64,
    pub halt_reason: Option<HaltReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramReport {
    pub bucket_width: usize,
    pub total: u64,
    pub buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub top_flow: Option<FlowEntry>,
    pub distinct_pair_count: usize,
    pub pairs: Vec<(Ipv4Addr, Ipv4Addr)>,
    pub per_source: Vec<(Endpoint, u64)>,
    pub per_destination: Vec<(Endpoint, u64)>,
    /// Largest first.
    pub flows: Vec<FlowEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullReport {
    pub summary: SessionSummary,
    pub histogram: HistogramReport,
    pub flows: FlowReport,
    pub lifecycle: LifecycleReport,
}

impl FullReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn frame_len(len: Option<usize>) -> String {
    len.map_or_else(|| "-".to_string(), |l| l.to_string())
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        let started = self.started_at.map_or_else(|| "-".to_string(), format_clock);

        writeln!(f, "Capture summary (started {started})")?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "{:<22} | {}", "Packets", s.packet_count)?;
        writeln!(f, "{:<22} | {}", "Bytes", s.byte_count)?;
        writeln!(f, "{:<22} | {:.2} s", "Elapsed", s.elapsed_seconds)?;
        writeln!(f, "{:<22} | {:.2} / {:.2}", "Avg pps / Mbps", s.avg_pps, s.avg_mbps)?;
        writeln!(f, "{:<22} | {:.2} / {:.2}", "Peak pps / Mbps", s.peak_pps, s.peak_mbps)?;
        writeln!(
            f,
            "{:<22} | {} / {} / {:.1}",
            "Frame min / max / avg",
            frame_len(s.min_frame_len),
            frame_len(s.max_frame_len),
            s.avg_frame_len
        )?;
        writeln!(f, "{:<22} | {}", "Undecoded frames", self.undecoded_frames)?;
        if self.archived_frames > 0 || self.writer_failures > 0 {
            writeln!(
                f,
                "{:<22} | {} ({} write failures)",
                "Archived frames", self.archived_frames, self.writer_failures
            )?;
        }
        if let Some(reason) = self.halt_reason {
            writeln!(f, "{:<22} | {reason}", "Halted")?;
        }
        write!(f, "{DOUBLE_RULE}")
    }
}

impl fmt::Display for HistogramReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame size distribution ({} frames)", self.total)?;
        writeln!(f, "{RULE}")?;

        let peak = self.buckets.iter().map(|b| b.count).max().unwrap_or(0);
        for bucket in &self.buckets {
            let range = match bucket.upper {
                Some(upper) => format!("{}-{}", bucket.lower, upper - 1),
                None => format!("{}+", bucket.lower),
            };
            let bar = if peak == 0 {
                0
            } else {
                (bucket.count * BAR_WIDTH).div_ceil(peak)
            };
            writeln!(
                f,
                "{:>11} | {:>8} | {}",
                range,
                bucket.count,
                "#".repeat(bar as usize)
            )?;
        }
        write!(f, "{DOUBLE_RULE}")
    }
}

impl fmt::Display for FlowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Flows ({} keys)", self.flows.len())?;
        writeln!(f, "{RULE}")?;
        match &self.top_flow {
            Some(top) => writeln!(
                f,
                "Top flow: {} ({} bytes, {} packets)",
                top.key, top.bytes, top.packets
            )?,
            None => writeln!(f, "Top flow: none")?,
        }
        writeln!(f, "Distinct endpoint pairs: {}", self.distinct_pair_count)?;
        writeln!(f, "{RULE}")?;
        writeln!(f, "{:<45} | {:>12} | {:>8}", "Connection", "Bytes", "Packets")?;
        for flow in &self.flows {
            writeln!(
                f,
                "{:<45} | {:>12} | {:>8}",
                flow.key.to_string(),
                flow.bytes,
                flow.packets
            )?;
        }
        write!(f, "{DOUBLE_RULE}")
    }
}

impl FlowReport {
    /// Unique host pairs and per-endpoint packet tallies.
    pub fn pairs_panel(&self) -> String {
        let mut out = format!("Unique endpoint pairs: {}\n{RULE}\n", self.distinct_pair_count);
        for (src, dst) in &self.pairs {
            out.push_str(&format!("{src} -> {dst}\n"));
        }
        out.push_str(&format!("{RULE}\n{:<28} | {:>8}\n", "Source", "Packets"));
        for (endpoint, packets) in &self.per_source {
            out.push_str(&format!("{:<28} | {:>8}\n", endpoint.to_string(), packets));
        }
        out.push_str(&format!("{RULE}\n{:<28} | {:>8}\n", "Destination", "Packets"));
        for (endpoint, packets) in &self.per_destination {
            out.push_str(&format!("{:<28} | {:>8}\n", endpoint.to_string(), packets));
        }
        out.push_str(DOUBLE_RULE);
        out
    }
}

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "TCP lifecycle: {} SYN, {} completed, {} half-open, {} ignored",
            self.syn_count, self.completed_count, self.incomplete_count, self.ignored_count
        )?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "{:<45} | {:>15} | {:>10} | {}",
            "Connection", "Start", "Duration", "State"
        )?;
        for c in &self.connections {
            let state = match c.outcome {
                Outcome::Completed => "completed",
                Outcome::Incomplete => "half-open",
            };
            writeln!(
                f,
                "{:<45} | {:>15.6} | {:>10.3} | {state}",
                c.key.to_string(),
                c.start_time.as_secs_f64(),
                c.duration
            )?;
        }
        writeln!(f, "{RULE}")?;
        match &self.anomaly_window {
            Some(window) => writeln!(
                f,
                "Half-open window: {} -> {} ({:.3} s)",
                format_clock(window.start),
                format_clock(window.end),
                window.duration()
            )?,
            None => writeln!(f, "Half-open window: none")?,
        }
        write!(f, "{DOUBLE_RULE}")
    }
}
