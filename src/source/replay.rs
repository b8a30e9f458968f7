use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use pcap_file::DataLink;

use super::{FrameSource, SourceEvent};
use crate::archive::ArchiveReader;
use crate::error::SourceError;

/// Replays the records of an existing capture archive.
pub struct ReplaySource {
    reader: ArchiveReader<File>,
    path: PathBuf,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| match source.kind() {
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied {
                what: path.display().to_string(),
            },
            _ => SourceError::FileOpen {
                path: path.clone(),
                source,
            },
        })?;

        let reader = ArchiveReader::new(file).map_err(|source| {
            SourceError::Archive {
                path: path.clone(),
                source,
            }
        })?;

        let header = reader.header();
        if header.datalink != DataLink::ETHERNET {
            warn!(
                "{} has link type {:?}; frames will decode as raw bytes only",
                path.display(),
                header.datalink
            );
        }
        info!(
            "replaying {} (pcap {}.{}, snaplen {})",
            path.display(),
            header.version_major,
            header.version_minor,
            header.snaplen
        );

        Ok(Self { reader, path })
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<SourceEvent, SourceError> {
        match self.reader.next_frame() {
            Ok(Some(frame)) => Ok(SourceEvent::Frame(frame)),
            Ok(None) => Ok(SourceEvent::Exhausted),
            Err(source) => Err(SourceError::Archive {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
