use std::collections::VecDeque;

use super::{FrameSource, SourceEvent};
use crate::error::SourceError;
use crate::frame::Frame;

/// Feeds a fixed list of events, then reports exhaustion.
#[derive(Debug, Default)]
pub struct MemorySource {
    events: VecDeque<SourceEvent>,
    live: bool,
}

impl MemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            events: frames.into_iter().map(SourceEvent::Frame).collect(),
            live: false,
        }
    }

    pub fn from_events(events: impl IntoIterator<Item = SourceEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            live: false,
        }
    }

    /// Behave like a live source (wall-clock duration bound).
    pub fn live(mut self) -> Self {
        self.live = true;
        self
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<SourceEvent, SourceError> {
        Ok(self.events.pop_front().unwrap_or(SourceEvent::Exhausted))
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn describe(&self) -> String {
        format!("memory ({} events queued)", self.events.len())
    }
}
