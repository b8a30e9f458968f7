use std::time::Duration;

use crate::config::SourceSpec;
use crate::error::SourceError;
use crate::frame::Frame;

#[cfg(target_os = "linux")]
mod live;
mod memory;
mod replay;

#[cfg(target_os = "linux")]
pub use live::LiveSource;
pub use memory::MemorySource;
pub use replay::ReplaySource;

/// How long a live read blocks before yielding [`SourceEvent::Idle`].
pub const LIVE_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Frame(Frame),
    /// Nothing arrived within the read timeout.
    Idle,
    Exhausted,
}

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<SourceEvent, SourceError>;

    /// Live sources are bounded by wall-clock time, replays by frame time.
    fn is_live(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// Opens the source selected by the configuration.
pub fn open_source(spec: &SourceSpec) -> Result<Box<dyn FrameSource>, SourceError> {
    match spec {
        SourceSpec::Replay(path) => Ok(Box::new(ReplaySource::open(path)?)),
        #[cfg(target_os = "linux")]
        SourceSpec::Interface(iface) => Ok(Box::new(LiveSource::open(iface, LIVE_READ_TIMEOUT)?)),
        #[cfg(not(target_os = "linux"))]
        SourceSpec::Interface(iface) => Err(SourceError::InterfaceUnavailable {
            iface: iface.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "live capture needs AF_PACKET (linux)",
            ),
        }),
    }
}
