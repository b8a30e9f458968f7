use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, warn};
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::{DataLink, Endianness, PcapError, TsResolution};

use crate::error::WriterError;
use crate::frame::Frame;

/// Destination of an archive.
///
/// Receives one `write_all` per record. After a failed write the sink is cut
/// back to the last whole record, so readers never meet a torn tail.
pub trait ArchiveSink: Write {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl ArchiveSink for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

/// Bytes the encoder produced for the record in progress.
#[derive(Clone, Default)]
struct Staging(Rc<RefCell<Vec<u8>>>);

impl Staging {
    /// Hands the staged bytes to `out` in one call and empties the stage,
    /// whether or not the write succeeds.
    fn drain_into(&self, out: &mut dyn ArchiveSink) -> io::Result<u64> {
        let mut staged = self.0.borrow_mut();
        let result = out.write_all(&staged).map(|_| staged.len() as u64);
        staged.clear();
        result
    }

    fn discard(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for Staging {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends frames to a little-endian, microsecond pcap archive.
pub struct ArchiveWriter {
    encoder: PcapWriter<Staging>,
    staging: Staging,
    out: Box<dyn ArchiveSink>,
    path: Option<PathBuf>,
    records: u64,
    /// Bytes known to be in the sink as whole records, header included.
    committed: u64,
}

impl ArchiveWriter {
    pub fn create(path: impl AsRef<Path>, snaplen: u32) -> Result<Self, WriterError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| WriterError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut writer = Self::from_sink(file, snaplen)?;
        writer.path = Some(path.to_path_buf());
        debug!("archive opened at {}", path.display());
        Ok(writer)
    }

    /// Wraps any sink; the global header is written immediately.
    pub fn from_sink(out: impl ArchiveSink + 'static, snaplen: u32) -> Result<Self, WriterError> {
        let header = PcapHeader {
            snaplen,
            datalink: DataLink::ETHERNET,
            ts_resolution: TsResolution::MicroSecond,
            endianness: Endianness::Little,
            ..PcapHeader::default()
        };
        let staging = Staging::default();
        let encoder = PcapWriter::with_header(staging.clone(), header)
            .map_err(|source| WriterError::Encode { records: 0, source })?;

        let mut writer = Self {
            encoder,
            staging,
            out: Box::new(out),
            path: None,
            records: 0,
            committed: 0,
        };
        writer.commit()?;
        Ok(writer)
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), WriterError> {
        let snaplen = self.encoder.snaplen() as usize;
        let captured = &frame.data()[..frame.captured_len().min(snaplen)];
        let orig_len = u32::try_from(frame.len()).unwrap_or(u32::MAX);
        let packet = PcapPacket::new(frame.timestamp().into(), orig_len, captured);

        if let Err(err) = self.encoder.write_packet(&packet) {
            self.staging.discard();
            return Err(self.encode_error(err));
        }
        self.commit()?;
        self.records += 1;
        Ok(())
    }

    /// Moves the staged bytes into the sink, rolling a partial write back to
    /// the previous record boundary.
    fn commit(&mut self) -> Result<(), WriterError> {
        match self.staging.drain_into(self.out.as_mut()) {
            Ok(written) => {
                self.committed += written;
                Ok(())
            }
            Err(source) => {
                if let Err(e) = self.out.truncate(self.committed) {
                    warn!("cannot trim torn archive record: {e}");
                }
                Err(WriterError::Write {
                    records: self.records,
                    source,
                })
            }
        }
    }

    fn encode_error(&self, err: PcapError) -> WriterError {
        match err {
            PcapError::IoError(source) => WriterError::Write {
                records: self.records,
                source,
            },
            source => WriterError::Encode {
                records: self.records,
                source,
            },
        }
    }

    pub fn flush(&mut self) -> Result<(), WriterError> {
        self.out.flush().map_err(WriterError::Close)
    }

    /// Flushes and releases the archive.
    pub fn close(mut self) -> Result<(), WriterError> {
        self.flush()?;
        if let Some(path) = &self.path {
            debug!(
                "archive {} closed: {} records, {} bytes",
                path.display(),
                self.records,
                self.committed
            );
        }
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    /// Length of the archive as whole records, global header included.
    pub fn committed_len(&self) -> u64 {
        self.committed
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        // Best effort; `close` is the checked path.
        self.out.flush().ok();
    }
}
