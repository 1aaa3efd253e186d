use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{Embedder, TextSplitter};
use crate::error::Result;

/// Percentile of neighbour distances above which a chunk boundary is placed.
const BREAKPOINT_PERCENTILE: f64 = 95.0;

/// Sentences on each side joined to a sentence before embedding it.
const BUFFER_SIZE: usize = 1;

/// Splits text where the meaning shifts between neighbouring sentences.
///
/// Each sentence is embedded together with its neighbours; a boundary goes
/// after every sentence whose cosine distance to the next one exceeds the
/// 95th percentile of all such distances.
pub struct SemanticSplitter {
    embedder: Box<dyn Embedder>,
    sentence_end: Regex,
}

impl SemanticSplitter {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            sentence_end: Regex::new(r"[.?!]\s+").expect("Invalid regex"),
        }
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;
        for m in self.sentence_end.find_iter(text) {
            // Keep the punctuation, drop the whitespace after it.
            let end = m.start() + 1;
            sentences.push(&text[start..end]);
            start = m.end();
        }
        if start < text.len() {
            sentences.push(&text[start..]);
        }
        sentences.retain(|s| !s.trim().is_empty());
        sentences
    }
}

#[async_trait]
impl TextSplitter for SemanticSplitter {
    async fn split_text(&self, text: &str) -> Result<Vec<String>> {
        let sentences = self.sentences(text);
        if sentences.len() <= 1 {
            return Ok(if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            });
        }

        let combined = combine_sentences(&sentences, BUFFER_SIZE);
        let embeddings = self.embedder.embed_documents(&combined).await?;
        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
            .collect();

        let threshold = percentile(&distances, BREAKPOINT_PERCENTILE);
        debug!(
            "Semantic split of {} sentences with {} breakpoint threshold {:.4}",
            sentences.len(),
            self.embedder.name(),
            threshold
        );

        let mut chunks = Vec::new();
        let mut start = 0;
        for (index, distance) in distances.iter().enumerate() {
            if *distance > threshold {
                chunks.push(sentences[start..=index].join(" "));
                start = index + 1;
            }
        }
        if start < sentences.len() {
            chunks.push(sentences[start..].join(" "));
        }

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}

/// Join every sentence with `buffer` neighbours on each side.
fn combine_sentences(sentences: &[&str], buffer: usize) -> Vec<String> {
    (0..sentences.len())
        .map(|i| {
            let from = i.saturating_sub(buffer);
            let to = (i + buffer + 1).min(sentences.len());
            sentences[from..to].join(" ")
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Embeds text as [occurrences of "Cat", occurrences of "Car"].
    struct KeywordEmbedder {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.matches("Cat").count() as f32, t.matches("Car").count() as f32])
                .collect())
        }

        fn name(&self) -> &'static str {
            "keyword"
        }
    }

    fn splitter() -> (SemanticSplitter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = KeywordEmbedder {
            calls: calls.clone(),
        };
        (SemanticSplitter::new(Box::new(embedder)), calls)
    }

    #[test]
    fn test_sentences() {
        let (splitter, _) = splitter();
        assert_eq!(
            splitter.sentences("One. Two?  Three! Four"),
            vec!["One.", "Two?", "Three!", "Four"]
        );
    }

    #[test]
    fn test_combine_sentences() {
        let combined = combine_sentences(&["a", "b", "c"], 1);
        assert_eq!(combined, vec!["a b", "a b c", "b c"]);
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0), 3.0);
        assert!((percentile(&[0.0, 10.0], 95.0) - 9.5).abs() < 1e-9);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_splits_at_topic_change() {
        let (splitter, calls) = splitter();
        let chunks = splitter
            .split_text("Cats purr. Cats nap. Cars honk. Cars race.")
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Cats purr. Cats nap.", "Cars honk. Cars race."]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_sentence_skips_embedding() {
        let (splitter, calls) = splitter();
        let chunks = splitter.split_text("Just one sentence").await.unwrap();

        assert_eq!(chunks, vec!["Just one sentence"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(splitter.split_text("   ").await.unwrap().is_empty());
    }
}
