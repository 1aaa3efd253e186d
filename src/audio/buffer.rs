use std::path::Path;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{CineNotesError, Result};

/// Decoded PCM audio held in memory as interleaved 16-bit samples.
#[derive(Debug, Clone)]
pub struct MediaBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl MediaBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Decode a WAV file.
    pub fn from_wav(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CineNotesError::FileNotFound(path.display().to_string()));
        }

        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        debug!(
            "Decoding {}: {} Hz, {} ch, {} bit {:?}",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (SampleFormat::Int, bits) => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| rescale_int(v, bits)))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        Ok(Self::new(spec.sample_rate, spec.channels, samples))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of sample frames (one sample per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0 || self.sample_rate == 0
    }

    pub fn duration(&self) -> Duration {
        self.frame_offset(self.frames())
    }

    /// Time position of a frame index.
    pub fn frame_offset(&self, frame: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = frame as u128 * 1_000_000_000 / u128::from(self.sample_rate);
        Duration::from_nanos(nanos as u64)
    }

    /// Write frames `[start, end)` as a 16-bit PCM WAV file.
    pub fn write_wav(&self, start: usize, end: usize, path: &Path) -> Result<()> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let channels = self.channels as usize;
        let end = end.min(self.frames());
        let start = start.min(end);

        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples[start * channels..end * channels] {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

fn rescale_int(value: i32, bits: u16) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}
