//! Raw frame capture with pcap archiving, streaming statistics, per-flow
//! accounting and TCP lifecycle tracking.

pub mod archive;
pub mod cli;
pub mod command;
pub mod config;
pub mod connection_key;
pub mod decode;
pub mod error;
pub mod flow;
pub mod frame;
pub mod lifecycle;
pub mod report;
pub mod session;
pub mod signal;
pub mod source;
pub mod stats;

pub use command::Command;
pub use config::{SessionConfig, SourceSpec, WriterPolicy};
pub use connection_key::ConnectionKey;
pub use error::{SessionError, SourceError, WriterError};
pub use frame::{Frame, Timestamp};
pub use session::{HaltReason, Session};
