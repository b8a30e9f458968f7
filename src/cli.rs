//! Command-line arguments for the `frame_sniffer` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::archive::DEFAULT_SNAPLEN;
use crate::config::{SessionConfig, SourceSpec, WriterPolicy};
use crate::lifecycle::DEFAULT_INCOMPLETE_SENTINEL;
use crate::stats::DEFAULT_BUCKET_WIDTH;

/// Default interface for live capture.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Default live capture duration in seconds. Replays run to the end.
pub const DEFAULT_DURATION_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("snaplen must be at least 1")]
    InvalidSnaplen,

    #[error("histogram bucket must be at least 1 byte")]
    InvalidBucket,
}

/// Capture raw frames, archive them as pcap and report traffic statistics.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "frame_sniffer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Interface to capture on.
    #[arg(short, long, default_value = DEFAULT_INTERFACE, conflicts_with = "replay")]
    pub interface: String,

    /// Replay an existing pcap archive instead of capturing live.
    #[arg(short, long, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Capture duration in seconds [default: 60 live, whole file on replay].
    /// 0 runs until Ctrl+C or end of file.
    #[arg(short, long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Write captured frames to this pcap archive.
    #[arg(short, long, value_name = "PATH")]
    pub pcap: Option<PathBuf>,

    /// Maximum bytes stored per frame in the archive.
    #[arg(long, default_value_t = DEFAULT_SNAPLEN)]
    pub snaplen: u32,

    /// What to do when writing the archive fails.
    #[arg(long, value_enum, default_value_t = WriterPolicy::Abort)]
    pub on_write_error: WriterPolicy,

    /// Duration shown for connections still half-open at the end.
    #[arg(long, default_value_t = DEFAULT_INCOMPLETE_SENTINEL, allow_negative_numbers = true)]
    pub incomplete_sentinel: f64,

    /// Width of the frame size histogram buckets in bytes.
    #[arg(long, default_value_t = DEFAULT_BUCKET_WIDTH)]
    pub histogram_bucket: usize,

    /// Write the full report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Skip the interactive menu and print every report.
    #[arg(long)]
    pub no_menu: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn validate(&self) -> Result<(), CliError> {
        if self.snaplen == 0 {
            return Err(CliError::InvalidSnaplen);
        }
        if self.histogram_bucket == 0 {
            return Err(CliError::InvalidBucket);
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let (source, duration) = match &self.replay {
            Some(path) => (SourceSpec::Replay(path.clone()), self.duration),
            None => (
                SourceSpec::Interface(self.interface.clone()),
                Some(self.duration.unwrap_or(DEFAULT_DURATION_SECS)),
            ),
        };

        let mut config = SessionConfig::new(source).with_writer_policy(self.on_write_error);
        if let Some(secs) = duration.filter(|secs| *secs > 0) {
            config = config.with_duration(Duration::from_secs(secs));
        }
        if let Some(path) = &self.pcap {
            config = config.with_archive(path);
        }
        config.snaplen = self.snaplen;
        config.incomplete_sentinel = self.incomplete_sentinel;
        config.histogram_bucket = self.histogram_bucket;
        config
    }

    /// Default `env_logger` filter for the verbosity count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub fn parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
