use crate::audio::Segment;
use crate::transcribe::{SegmentResponse, Transcriber};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})";

/// Statistics from one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub total_segments: usize,
    pub successful_segments: usize,
    pub failed_segments: usize,
    pub total_time: Duration,
    pub avg_segment_time: Duration,
}

/// Sends every segment of a run concurrently and waits for all of them.
pub struct Dispatcher {
    transcriber: Arc<dyn Transcriber>,
    show_progress: bool,
}

impl Dispatcher {
    /// Create a new dispatcher with the given transcriber.
    pub fn new(transcriber: Box<dyn Transcriber>) -> Self {
        Self::from_shared(Arc::from(transcriber))
    }

    pub fn from_shared(transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            transcriber,
            show_progress: true,
        }
    }

    /// Enable or disable progress bar display.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Dispatch all segments and return one response per segment.
    ///
    /// `responses[i]` belongs to `segments[i]` whatever order the requests
    /// finish in. Individual failures become [`SegmentResponse::Failure`] and
    /// never cancel the other requests.
    pub async fn dispatch(&self, segments: &[Segment]) -> Vec<SegmentResponse> {
        self.dispatch_with_stats(segments).await.0
    }

    pub async fn dispatch_with_stats(
        &self,
        segments: &[Segment],
    ) -> (Vec<SegmentResponse>, DispatchStats) {
        if segments.is_empty() {
            return (Vec::new(), DispatchStats::default());
        }

        let total_segments = segments.len();
        let start_time = Instant::now();

        info!(
            "Dispatching {} segments concurrently to {}",
            total_segments,
            self.transcriber.name()
        );

        let progress_bar = if self.show_progress {
            let pb = ProgressBar::new(total_segments as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(PROGRESS_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut futures = FuturesUnordered::new();

        for (position, segment) in segments.iter().enumerate() {
            let transcriber = self.transcriber.clone();
            let pb = progress_bar.clone();

            futures.push(async move {
                let segment_start = Instant::now();
                debug!("Starting transcription of segment {}", segment.index);

                let response = match transcriber.transcribe(segment).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Segment {} failed: {}", segment.index, e);
                        SegmentResponse::Failure {
                            error: e.to_string(),
                        }
                    }
                };
                let elapsed = segment_start.elapsed();

                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                debug!(
                    "Segment {} finished in {}ms",
                    segment.index,
                    elapsed.as_millis()
                );

                (position, response, elapsed)
            });
        }

        let mut results = Vec::with_capacity(total_segments);
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Transcription complete");
        }

        // Completion order is arbitrary; restore input order.
        results.sort_by_key(|(position, _, _)| *position);

        let total_segment_time: Duration = results.iter().map(|(_, _, t)| *t).sum();
        let responses: Vec<SegmentResponse> = results.into_iter().map(|(_, r, _)| r).collect();

        let successful_segments = responses.iter().filter(|r| r.is_success()).count();
        let stats = DispatchStats {
            total_segments,
            successful_segments,
            failed_segments: total_segments - successful_segments,
            total_time: start_time.elapsed(),
            avg_segment_time: total_segment_time / total_segments as u32,
        };

        info!(
            "Dispatch complete: {}/{} segments successful in {:.2}s (avg {:.2}s/segment)",
            stats.successful_segments,
            stats.total_segments,
            stats.total_time.as_secs_f64(),
            stats.avg_segment_time.as_secs_f64()
        );

        (responses, stats)
    }
}
