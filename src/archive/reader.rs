use std::io::{self, Read};

use log::warn;
use pcap_file::TsResolution;
use pcap_file::pcap::{PcapHeader, PcapReader, RawPcapPacket};

use crate::error::ArchiveError;
use crate::frame::{Frame, Timestamp};

/// Largest record accepted regardless of the declared snap length.
const MAX_RECORD_LEN: u32 = 262_144;

/// Sequential reader over pcap records, either byte order, µs or ns stamps.
pub struct ArchiveReader<R: Read> {
    inner: PcapReader<R>,
    header: PcapHeader,
    records: u64,
    done: bool,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(input: R) -> Result<Self, ArchiveError> {
        let inner = PcapReader::new(input).map_err(|err| match ArchiveError::from(err) {
            ArchiveError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                ArchiveError::TruncatedHeader
            }
            other => other,
        })?;

        Ok(Self {
            header: inner.header(),
            inner,
            records: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &PcapHeader {
        &self.header
    }

    /// Next frame, or `None` at end of archive.
    ///
    /// A record cut short by the end of the file ends the stream.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ArchiveError> {
        if self.done {
            return Ok(None);
        }

        // Raw records: a snaplen-truncated frame keeps an orig_len above the
        // snap length, which the validated packet path refuses.
        let header = self.header;
        let next = self.inner.next_raw_packet().map(|read| {
            read.map_err(ArchiveError::from)
                .and_then(|raw| to_frame(&header, &raw))
        });

        match next {
            None => self.finish(),
            Some(Ok(frame)) => {
                self.records += 1;
                Ok(Some(frame))
            }
            Some(Err(ArchiveError::Io(e))) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("archive ends inside a record after {} records", self.records);
                self.finish()
            }
            Some(Err(e)) => Err(e),
        }
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    fn finish(&mut self) -> Result<Option<Frame>, ArchiveError> {
        self.done = true;
        Ok(None)
    }
}

fn to_frame(header: &PcapHeader, raw: &RawPcapPacket) -> Result<Frame, ArchiveError> {
    if raw.incl_len > header.snaplen.max(MAX_RECORD_LEN) {
        return Err(ArchiveError::OversizedRecord {
            len: raw.incl_len,
            snaplen: header.snaplen,
        });
    }

    let micros = if header.ts_resolution == TsResolution::NanoSecond {
        raw.ts_frac / 1_000
    } else {
        raw.ts_frac
    };

    Ok(Frame::with_orig_len(
        raw.data.to_vec(),
        Timestamp::new(u64::from(raw.ts_sec), micros),
        raw.orig_len as usize,
    ))
}
