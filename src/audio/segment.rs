use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{CineNotesError, Result};

use super::{MediaBuffer, Segment};

const SCRATCH_PREFIX: &str = "cinenotes_segments_";

/// Scratch storage owning the segment files of one run.
///
/// The directory is removed by [`ScratchDir::cleanup`] or, failing that, on
/// drop. Removal errors are logged and never returned.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!("Allocated scratch directory {}", dir.path().display());
        Ok(Self {
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }

    /// Location of the directory; stays valid after removal.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!("Removed scratch directory {}", self.path.display()),
                Err(e) => warn!(
                    "Failed to remove scratch directory {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Ordered segment files together with the storage that holds them.
#[derive(Debug)]
pub struct SegmentSet {
    pub segments: Vec<Segment>,
    pub scratch: ScratchDir,
}

impl SegmentSet {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Split a buffer into consecutive `chunk_length` windows, one WAV file each,
/// under a fresh directory in the system temp location.
pub fn split(buffer: &MediaBuffer, chunk_length: Duration) -> Result<SegmentSet> {
    split_in(buffer, chunk_length, None)
}

/// Like [`split`], placing the scratch directory under `parent` when given.
pub fn split_in(
    buffer: &MediaBuffer,
    chunk_length: Duration,
    parent: Option<&Path>,
) -> Result<SegmentSet> {
    split_with(buffer, chunk_length, parent, |buffer, start, end, path| {
        buffer.write_wav(start, end, path)
    })
}

fn split_with<F>(
    buffer: &MediaBuffer,
    chunk_length: Duration,
    parent: Option<&Path>,
    mut export: F,
) -> Result<SegmentSet>
where
    F: FnMut(&MediaBuffer, usize, usize, &Path) -> Result<()>,
{
    if buffer.is_empty() {
        return Err(CineNotesError::InvalidInput(
            "Media buffer is empty".to_string(),
        ));
    }
    if chunk_length.is_zero() {
        return Err(CineNotesError::InvalidInput(
            "Chunk length must be positive".to_string(),
        ));
    }

    let window = window_frames(chunk_length, buffer.sample_rate());
    if window == 0 {
        return Err(CineNotesError::InvalidInput(format!(
            "Chunk length {:?} is shorter than one sample at {} Hz",
            chunk_length,
            buffer.sample_rate()
        )));
    }

    let ranges = plan_windows(buffer.frames(), window);
    let scratch = ScratchDir::create(parent)?;
    let dir = scratch.path().to_path_buf();

    info!(
        "Splitting {:.1}s of audio into {} segments of {:.0}s in {}",
        buffer.duration().as_secs_f64(),
        ranges.len(),
        chunk_length.as_secs_f64(),
        dir.display()
    );

    let mut segments = Vec::with_capacity(ranges.len());
    for (index, (start, end)) in ranges.into_iter().enumerate() {
        let path = dir.join(format!("chunk_{:04}.wav", index));
        // Dropping `scratch` on error removes the partial set.
        export(buffer, start, end, &path).map_err(|e| {
            CineNotesError::Segmentation(format!("Failed to export segment {}: {}", index, e))
        })?;

        let segment = Segment {
            index,
            path,
            start: buffer.frame_offset(start),
            end: buffer.frame_offset(end),
        };
        debug!(
            "Created segment {}: {:?} to {:?}",
            index, segment.start, segment.end
        );
        segments.push(segment);
    }

    Ok(SegmentSet { segments, scratch })
}

fn window_frames(chunk_length: Duration, sample_rate: u32) -> usize {
    (chunk_length.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Plan `[start, end)` frame windows covering `total` frames.
fn plan_windows(total: usize, window: usize) -> Vec<(usize, usize)> {
    let mut windows = Vec::new();
    let mut current = 0;

    while current < total {
        let end = (current + window).min(total);
        windows.push((current, end));
        current = end;
    }

    windows
}
