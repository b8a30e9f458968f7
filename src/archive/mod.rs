//! libpcap capture archives: the writer used during capture and the reader
//! behind file replay. Encoding is delegated to `pcap-file`.

mod reader;
mod writer;

pub use reader::ArchiveReader;
pub use writer::{ArchiveSink, ArchiveWriter};

pub const DEFAULT_SNAPLEN: u32 = 65535;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;
