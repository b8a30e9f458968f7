//! Capture session: drives a frame source through the decoder into every sink.
//!
//! Per frame, in order: decode, archive, statistics, flow table, lifecycle
//! tracker. All sink updates for a frame finish before the next read. After
//! the session halts, the query methods work only on accumulated state.

use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use serde::Serialize;

use crate::archive::ArchiveWriter;
use crate::config::{SessionConfig, WriterPolicy};
use crate::decode::decode;
use crate::error::{SessionError, WriterError};
use crate::flow::FlowTable;
use crate::frame::{Frame, Timestamp};
use crate::lifecycle::{LifecycleReport, LifecycleTracker};
use crate::report::{FlowReport, FullReport, HistogramReport, SessionSummary, format_clock};
use crate::signal::ShutdownCheck;
use crate::source::{FrameSource, SourceEvent};
use crate::stats::{DEFAULT_HISTOGRAM_LIMIT, RateSample, SizeHistogram, TrafficStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HaltReason {
    DurationElapsed,
    Stopped,
    Exhausted,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DurationElapsed => write!(f, "capture duration elapsed"),
            HaltReason::Stopped => write!(f, "stopped by signal"),
            HaltReason::Exhausted => write!(f, "source exhausted"),
        }
    }
}

pub struct Session {
    config: SessionConfig,
    writer: Option<ArchiveWriter>,
    stats: TrafficStats,
    histogram: SizeHistogram,
    flows: FlowTable,
    lifecycle: LifecycleTracker,
    undecoded: u64,
    writer_failures: u64,
    archived: u64,
    halt: Option<HaltReason>,
}

impl Session {
    /// Builds fresh accumulators and opens the archive when one is configured.
    pub fn new(config: SessionConfig) -> Result<Self, WriterError> {
        let writer = match &config.archive_path {
            Some(path) => Some(ArchiveWriter::create(path, config.snaplen)?),
            None => None,
        };
        Ok(Self::with_writer(config, writer))
    }

    /// Uses the given writer instead of opening `archive_path`.
    pub fn with_writer(config: SessionConfig, writer: Option<ArchiveWriter>) -> Self {
        Self {
            stats: TrafficStats::new(config.min_rate_window),
            histogram: SizeHistogram::new(config.histogram_bucket, DEFAULT_HISTOGRAM_LIMIT),
            flows: FlowTable::new(),
            lifecycle: LifecycleTracker::new(),
            writer,
            undecoded: 0,
            writer_failures: 0,
            archived: 0,
            halt: None,
            config,
        }
    }

    /// Pulls frames until the duration elapses, a stop is requested or the
    /// source runs dry. The archive is flushed and closed before returning.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        shutdown: &dyn ShutdownCheck,
    ) -> Result<HaltReason, SessionError> {
        let live = source.is_live();
        let started = Instant::now();
        if live {
            self.stats.begin(Timestamp::now());
        }
        info!("capturing from {}", source.describe());

        let result = loop {
            if shutdown.should_stop() {
                break Ok(HaltReason::Stopped);
            }
            if live && self.config.duration.is_some_and(|d| started.elapsed() >= d) {
                break Ok(HaltReason::DurationElapsed);
            }

            let frame = match source.next_frame() {
                Ok(SourceEvent::Frame(frame)) => frame,
                Ok(SourceEvent::Idle) => {
                    if live {
                        self.stats.mark(Timestamp::now());
                    }
                    debug!("no frames received in the last read interval");
                    continue;
                }
                Ok(SourceEvent::Exhausted) => break Ok(HaltReason::Exhausted),
                Err(e) => break Err(SessionError::from(e)),
            };

            if !live && self.replay_deadline_passed(&frame) {
                break Ok(HaltReason::DurationElapsed);
            }

            match self.process_frame(&frame) {
                Ok(Some(sample)) => log_sample(&sample),
                Ok(None) => {}
                Err(e) => break Err(SessionError::from(e)),
            }
        };

        if live {
            self.stats.mark(Timestamp::now());
        }
        let closed = self.close_archive();

        match result {
            Ok(reason) => {
                self.halt = Some(reason);
                info!("session halted: {reason}");
                closed?;
                Ok(reason)
            }
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!("archive close after failure: {close_err}");
                }
                Err(e)
            }
        }
    }

    /// Fans one frame out to every sink.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Option<RateSample>, WriterError> {
        let headers = decode(frame.data());
        if let Some(anomaly) = headers.anomaly {
            self.undecoded += 1;
            debug!("frame at {}: {anomaly}", frame.timestamp());
        }

        self.archive(frame)?;

        let sample = self.stats.record(frame.len(), frame.timestamp());
        self.histogram.record(frame.len());

        let key = headers.connection_key();
        if let Some(key) = key {
            self.flows.record(key, frame.len());
        }

        match (key, headers.tcp()) {
            (Some(key), Some(tcp)) => {
                self.lifecycle.apply(key, tcp.flags, frame.timestamp());
            }
            _ => self.lifecycle.ignore(),
        }

        Ok(sample)
    }

    fn archive(&mut self, frame: &Frame) -> Result<(), WriterError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        match writer.write_frame(frame) {
            Ok(()) => {
                self.archived += 1;
                Ok(())
            }
            Err(e) => {
                self.writer_failures += 1;
                match self.config.writer_policy {
                    WriterPolicy::Abort => Err(e),
                    WriterPolicy::Degrade => {
                        warn!("archive disabled, capture continues: {e}");
                        self.writer = None;
                        Ok(())
                    }
                }
            }
        }
    }

    fn replay_deadline_passed(&self, frame: &Frame) -> bool {
        match (self.config.duration, self.stats.window_start()) {
            (Some(limit), Some(start)) => {
                frame.timestamp().seconds_since(start) >= limit.as_secs_f64()
            }
            _ => false,
        }
    }

    fn close_archive(&mut self) -> Result<(), WriterError> {
        match self.writer.take() {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            stats: self.stats.snapshot(),
            started_at: self.stats.window_start(),
            undecoded_frames: self.undecoded,
            archived_frames: self.archived,
            writer_failures: self.writer_failures,
            halt_reason: self.halt,
        }
    }

    pub fn histogram(&self) -> HistogramReport {
        HistogramReport {
            bucket_width: self.config.histogram_bucket,
            total: self.histogram.total(),
            buckets: self.histogram.buckets(),
        }
    }

    pub fn flow_report(&self) -> FlowReport {
        FlowReport {
            top_flow: self.flows.top_by_volume(),
            distinct_pair_count: self.flows.distinct_pair_count(),
            pairs: self.flows.distinct_endpoint_pairs().into_iter().collect(),
            per_source: self.flows.per_source().into_iter().collect(),
            per_destination: self.flows.per_destination().into_iter().collect(),
            flows: self.flows.flows(),
        }
    }

    pub fn lifecycle_report(&self) -> LifecycleReport {
        self.lifecycle.report(self.config.incomplete_sentinel)
    }

    pub fn full_report(&self) -> FullReport {
        FullReport {
            summary: self.summary(),
            histogram: self.histogram(),
            flows: self.flow_report(),
            lifecycle: self.lifecycle_report(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

fn log_sample(sample: &RateSample) {
    info!(
        "[{}] t+{}s  {:.2} pps  {:.2} Mbps",
        format_clock(sample.timestamp),
        sample.second,
        sample.pps,
        sample.mbps
    );
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use super::*;
    use crate::archive::ArchiveSink;
    use crate::config::SourceSpec;
    use crate::connection_key::ConnectionKey;
    use crate::decode::TcpFlags;
    use crate::decode::testutil::tcp_frame;
    use crate::lifecycle::Outcome;
    use crate::signal::{NeverShutdown, ShutdownFlag};
    use crate::source::MemorySource;

    const CLIENT: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const SERVER: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

    fn config() -> SessionConfig {
        SessionConfig::new(SourceSpec::Interface("test0".to_string()))
    }

    fn frame(port: u16, flags: u8, secs: f64) -> Frame {
        Frame::new(
            tcp_frame((CLIENT, port), (SERVER, 80), flags),
            Timestamp::from_secs_f64(secs),
        )
    }

    struct FailAfter {
        remaining: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::other("no space left"));
            }
            self.remaining -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ArchiveSink for FailAfter {
        fn truncate(&mut self, _len: u64) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_counts_every_frame_including_garbage() {
        let frames = vec![
            frame(1000, TcpFlags::SYN, 100.0),
            Frame::new(vec![0xff; 5], Timestamp::from_secs_f64(100.2)),
            frame(1000, TcpFlags::ACK | TcpFlags::FIN, 101.0),
        ];
        let total: usize = frames.iter().map(Frame::len).sum();

        let mut session = Session::new(config()).unwrap();
        let mut source = MemorySource::new(frames);
        let reason = session.run(&mut source, &NeverShutdown).unwrap();
        assert_eq!(reason, HaltReason::Exhausted);

        let summary = session.summary();
        assert_eq!(summary.stats.packet_count, 3);
        assert_eq!(summary.stats.byte_count, total as u64);
        assert_eq!(summary.undecoded_frames, 1);
        assert_eq!(summary.halt_reason, Some(HaltReason::Exhausted));

        let lifecycle = session.lifecycle_report();
        assert_eq!(lifecycle.completed_count, 1);
        assert_eq!(lifecycle.ignored_count, 1);
    }

    #[test]
    fn test_lifecycle_scenario_through_session() {
        let frames = vec![
            frame(1000, TcpFlags::SYN, 0.0),
            frame(1000, TcpFlags::ACK | TcpFlags::FIN, 2.5),
            frame(2000, TcpFlags::SYN, 10.0),
        ];
        let mut session = Session::new(config()).unwrap();
        session
            .run(&mut MemorySource::new(frames), &NeverShutdown)
            .unwrap();

        let report = session.lifecycle_report();
        assert_eq!(report.connections.len(), 2);
        assert_eq!(report.connections[0].outcome, Outcome::Completed);
        assert_eq!(report.connections[0].duration, 2.5);
        assert_eq!(report.connections[1].outcome, Outcome::Incomplete);
        let window = report.anomaly_window.unwrap();
        assert_eq!(window.start.as_secs_f64(), 10.0);
        assert_eq!(window.end.as_secs_f64(), 10.0);
    }

    #[test]
    fn test_flow_report_tracks_top_flow() {
        let mut session = Session::new(config()).unwrap();
        for (i, port) in [1000u16, 1000, 2000].iter().enumerate() {
            session
                .process_frame(&frame(*port, TcpFlags::ACK, i as f64))
                .unwrap();
        }
        let report = session.flow_report();
        let top = report.top_flow.unwrap();
        assert_eq!(top.key, ConnectionKey::new(CLIENT, 1000, SERVER, 80));
        assert_eq!(top.packets, 2);
        assert_eq!(report.distinct_pair_count, 1);
        assert_eq!(report.flows.len(), 2);
    }

    #[test]
    fn test_stop_signal_halts_before_reading() {
        let shutdown = ShutdownFlag::manual();
        shutdown.trigger();
        let mut session = Session::new(config()).unwrap();
        let mut source = MemorySource::new(vec![frame(1, TcpFlags::SYN, 1.0)]);
        let reason = session.run(&mut source, &shutdown).unwrap();
        assert_eq!(reason, HaltReason::Stopped);
        assert_eq!(session.summary().stats.packet_count, 0);
    }

    #[test]
    fn test_replay_duration_uses_frame_time() {
        let frames: Vec<Frame> = (0..10)
            .map(|i| frame(1000, TcpFlags::ACK, 50.0 + i as f64))
            .collect();
        let config = config().with_duration(Duration::from_secs(5));
        let mut session = Session::new(config).unwrap();
        let reason = session
            .run(&mut MemorySource::new(frames), &NeverShutdown)
            .unwrap();
        assert_eq!(reason, HaltReason::DurationElapsed);
        assert_eq!(session.summary().stats.packet_count, 5);
    }

    #[test]
    fn test_live_idle_does_not_count() {
        let events = vec![
            SourceEvent::Idle,
            SourceEvent::Frame(frame(1, TcpFlags::SYN, 1.0)),
            SourceEvent::Idle,
        ];
        let mut session = Session::new(config()).unwrap();
        let mut source = MemorySource::from_events(events).live();
        session.run(&mut source, &NeverShutdown).unwrap();
        assert_eq!(session.summary().stats.packet_count, 1);
    }

    #[test]
    fn test_writer_failure_aborts_by_default() {
        // The global header consumes the only successful write.
        let writer = ArchiveWriter::from_sink(FailAfter { remaining: 1 }, 65535).unwrap();
        let mut session = Session::with_writer(config(), Some(writer));
        let frames = vec![frame(1, TcpFlags::SYN, 1.0), frame(2, TcpFlags::SYN, 2.0)];
        let result = session.run(&mut MemorySource::new(frames), &NeverShutdown);

        assert!(matches!(result, Err(SessionError::Writer(_))));
        let summary = session.summary();
        assert_eq!(summary.writer_failures, 1);
        assert_eq!(summary.stats.packet_count, 0);
        assert_eq!(summary.halt_reason, None);
    }

    #[test]
    fn test_writer_failure_degrades_when_configured() {
        let writer = ArchiveWriter::from_sink(FailAfter { remaining: 2 }, 65535).unwrap();
        let config = config().with_writer_policy(WriterPolicy::Degrade);
        let mut session = Session::with_writer(config, Some(writer));
        let frames = vec![
            frame(1, TcpFlags::SYN, 1.0),
            frame(2, TcpFlags::SYN, 2.0),
            frame(3, TcpFlags::SYN, 3.0),
        ];
        let reason = session
            .run(&mut MemorySource::new(frames), &NeverShutdown)
            .unwrap();

        assert_eq!(reason, HaltReason::Exhausted);
        let summary = session.summary();
        assert_eq!(summary.archived_frames, 1);
        assert_eq!(summary.writer_failures, 1);
        assert_eq!(summary.stats.packet_count, 3);
    }

    #[test]
    fn test_archive_open_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config().with_archive(dir.path().join("nope").join("x.pcap"));
        assert!(matches!(Session::new(config), Err(WriterError::Open { .. })));
    }
}
