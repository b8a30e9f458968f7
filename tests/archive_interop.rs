//! Archives written here must be readable by an independent pcap parser,
//! and archives written by other tools must replay here.

mod common;

use std::borrow::Cow;
use std::fs::File;
use std::time::Duration;

use pcap_file::pcap::{PcapHeader, PcapPacket, PcapReader, PcapWriter};
use pcap_file::{DataLink, Endianness, TsResolution};

use common::{ACK, SYN, at, host, mixed_traffic, tcp};
use frame_sniffer::archive::ArchiveWriter;
use frame_sniffer::source::{FrameSource, ReplaySource, SourceEvent};
use frame_sniffer::{Frame, SourceError};

fn drain(source: &mut dyn FrameSource) -> Vec<Frame> {
    let mut frames = Vec::new();
    loop {
        match source.next_frame().unwrap() {
            SourceEvent::Frame(frame) => frames.push(frame),
            SourceEvent::Idle => continue,
            SourceEvent::Exhausted => return frames,
        }
    }
}

#[test]
fn archive_is_readable_by_pcap_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.pcap");
    let frames = mixed_traffic();

    let mut writer = ArchiveWriter::create(&path, 65535).unwrap();
    for frame in &frames {
        writer.write_frame(frame).unwrap();
    }
    writer.close().unwrap();

    let mut reader = PcapReader::new(File::open(&path).unwrap()).unwrap();
    let header = reader.header();
    assert_eq!(header.datalink, DataLink::ETHERNET);
    assert_eq!(header.snaplen, 65535);
    assert_eq!(header.ts_resolution, TsResolution::MicroSecond);
    assert_eq!((header.version_major, header.version_minor), (2, 4));

    let mut count = 0;
    while let Some(packet) = reader.next_packet() {
        let packet = packet.unwrap();
        let expected = &frames[count];
        assert_eq!(packet.data.as_ref(), expected.data());
        assert_eq!(packet.orig_len as usize, expected.len());
        assert_eq!(
            packet.timestamp.as_micros() as u64,
            expected.timestamp().as_micros()
        );
        count += 1;
    }
    assert_eq!(count, frames.len());
}

#[test]
fn replay_returns_frames_in_written_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ordered.pcap");
    let frames: Vec<Frame> = (0..50u16)
        .map(|i| {
            at(
                2000.0 + f64::from(i) * 0.01,
                tcp((host(1), 1000 + i), (host(2), 80), ACK, usize::from(i)),
            )
        })
        .collect();

    let mut writer = ArchiveWriter::create(&path, 65535).unwrap();
    for frame in &frames {
        writer.write_frame(frame).unwrap();
    }
    writer.close().unwrap();

    let replayed = drain(&mut ReplaySource::open(&path).unwrap());
    assert_eq!(replayed, frames);
}

#[test]
fn snaplen_truncation_keeps_original_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.pcap");
    let frame = at(5.0, tcp((host(1), 1), (host(2), 2), SYN, 1000));

    let mut writer = ArchiveWriter::create(&path, 96).unwrap();
    writer.write_frame(&frame).unwrap();
    writer.close().unwrap();

    let replayed = drain(&mut ReplaySource::open(&path).unwrap());
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].captured_len(), 96);
    assert_eq!(replayed[0].len(), frame.len());
    assert_eq!(replayed[0].data(), &frame.data()[..96]);
}

#[test]
fn replays_big_endian_nanosecond_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.pcap");
    let data = tcp((host(3), 4000), (host(4), 22), SYN, 0);

    let header = PcapHeader {
        endianness: Endianness::Big,
        ts_resolution: TsResolution::NanoSecond,
        ..PcapHeader::default()
    };
    let mut writer = PcapWriter::with_header(File::create(&path).unwrap(), header).unwrap();
    writer
        .write_packet(&PcapPacket {
            timestamp: Duration::new(1_700_000_000, 123_456_789),
            orig_len: data.len() as u32,
            data: Cow::Borrowed(&data),
        })
        .unwrap();
    drop(writer);

    let replayed = drain(&mut ReplaySource::open(&path).unwrap());
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].data(), data.as_slice());
    assert_eq!(replayed[0].timestamp().secs, 1_700_000_000);
    assert_eq!(replayed[0].timestamp().micros, 123_456);
}

#[test]
fn truncated_trailing_record_ends_replay() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.pcap");
    let frames = mixed_traffic();

    let mut writer = ArchiveWriter::create(&path, 65535).unwrap();
    for frame in &frames {
        writer.write_frame(frame).unwrap();
    }
    writer.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

    let replayed = drain(&mut ReplaySource::open(&path).unwrap());
    assert_eq!(replayed.len(), frames.len() - 1);
}

#[test]
fn rejects_files_that_are_not_archives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"definitely not a capture file, just text").unwrap();

    assert!(matches!(
        ReplaySource::open(&path),
        Err(SourceError::Archive { .. })
    ));
    assert!(matches!(
        ReplaySource::open(dir.path().join("missing.pcap")),
        Err(SourceError::FileOpen { .. })
    ));
}
