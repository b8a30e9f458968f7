//! Error types for capture sessions.

use std::io;
use std::path::PathBuf;

use pcap_file::PcapError;

/// Exit codes for the `frame_sniffer` binary.
pub mod codes {
    pub const SUCCESS: u8 = 0;
    pub const CONFIG_ERROR: u8 = 1;
    pub const SOURCE_ERROR: u8 = 2;
    pub const WRITER_ERROR: u8 = 3;
    pub const REPORT_ERROR: u8 = 4;
}

/// Problems parsing a capture archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive header is truncated")]
    TruncatedHeader,

    #[error("record of {len} bytes exceeds snap length {snaplen}")]
    OversizedRecord { len: u32, snaplen: u32 },

    #[error("malformed archive: {0}")]
    Format(PcapError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<PcapError> for ArchiveError {
    fn from(err: PcapError) -> Self {
        match err {
            PcapError::IoError(e) => ArchiveError::Io(e),
            other => ArchiveError::Format(other),
        }
    }
}

/// Frame source failures. Fatal: the session never starts.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("interface {iface} unavailable: {source}")]
    InterfaceUnavailable { iface: String, source: io::Error },

    #[error("permission denied opening {what} (raw capture needs CAP_NET_RAW)")]
    PermissionDenied { what: String },

    #[error("cannot open capture file {path}: {source}")]
    FileOpen { path: PathBuf, source: io::Error },

    #[error("capture file {path} is invalid: {source}")]
    Archive { path: PathBuf, source: ArchiveError },

    #[error("read failed: {0}")]
    Read(#[from] io::Error),
}

/// Archive writer failures, reported to the session as they happen.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("cannot create archive {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("archive write failed after {records} records: {source}")]
    Write { records: u64, source: io::Error },

    #[error("cannot encode archive record {records}: {source}")]
    Encode { records: u64, source: PcapError },

    #[error("archive close failed: {0}")]
    Close(io::Error),
}

/// Terminal session failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Map an error to its exit code.
pub fn exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::Source(_) => codes::SOURCE_ERROR,
        SessionError::Writer(_) => codes::WRITER_ERROR,
    }
}
