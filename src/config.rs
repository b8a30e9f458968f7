use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::archive::DEFAULT_SNAPLEN;
use crate::lifecycle::DEFAULT_INCOMPLETE_SENTINEL;
use crate::stats::{DEFAULT_BUCKET_WIDTH, DEFAULT_MIN_RATE_WINDOW};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Interface(String),
    Replay(PathBuf),
}

/// What the session does when the archive writer fails mid-capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WriterPolicy {
    /// Stop the session with the writer error.
    #[default]
    Abort,
    /// Drop the archive and keep collecting statistics.
    Degrade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub source: SourceSpec,
    /// `None` runs until stopped or exhausted.
    pub duration: Option<Duration>,
    pub archive_path: Option<PathBuf>,
    pub snaplen: u32,
    pub writer_policy: WriterPolicy,
    pub incomplete_sentinel: f64,
    pub histogram_bucket: usize,
    pub min_rate_window: f64,
}

impl SessionConfig {
    pub fn new(source: SourceSpec) -> Self {
        Self {
            source,
            duration: None,
            archive_path: None,
            snaplen: DEFAULT_SNAPLEN,
            writer_policy: WriterPolicy::default(),
            incomplete_sentinel: DEFAULT_INCOMPLETE_SENTINEL,
            histogram_bucket: DEFAULT_BUCKET_WIDTH,
            min_rate_window: DEFAULT_MIN_RATE_WINDOW,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    pub fn with_writer_policy(mut self, policy: WriterPolicy) -> Self {
        self.writer_policy = policy;
        self
    }
}
