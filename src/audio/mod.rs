pub mod buffer;
pub mod extract;
pub mod segment;

pub use buffer::MediaBuffer;
pub use extract::{check_ffmpeg, check_ffprobe, extract_audio, get_audio_duration};
pub use segment::{split, split_in, ScratchDir, SegmentSet};

use std::path::PathBuf;
use std::time::Duration;

/// Metadata about an audio file.
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u16,
}

/// A contiguous slice of a [`MediaBuffer`] written out as its own WAV file.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub start: Duration,
    pub end: Duration,
}

impl Segment {
    /// Get the duration of this segment.
    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}
