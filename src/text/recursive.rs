use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::warn;

use super::TextSplitter;
use crate::error::{CineNotesError, Result};

const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits on the coarsest separator present, recursing into pieces that are
/// still too long, then merges small pieces back up to `chunk_size` chars.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CineNotesError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(CineNotesError::Config(format!(
                "Got a larger chunk overlap ({}) than chunk size ({}), should be smaller",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                good_splits.push(piece);
                continue;
            }
            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, ""));
                good_splits.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, ""));
        }

        final_chunks
    }

    /// Greedily join pieces into chunks of at most `chunk_size` chars,
    /// carrying up to `chunk_overlap` chars into the next chunk.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joined_len = |current: &VecDeque<&str>, total: usize| {
                total + len + if current.is_empty() { 0 } else { separator_len }
            };

            if joined_len(&current, total) > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }
                if !current.is_empty() {
                    push_joined(&mut docs, &current, separator);
                    while total > self.chunk_overlap
                        || (joined_len(&current, total) > self.chunk_size && total > 0)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        let joiner = if current.is_empty() { 0 } else { separator_len };
                        total -= char_len(first) + joiner;
                    }
                }
            }

            current.push_back(split.as_str());
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

#[async_trait]
impl TextSplitter for RecursiveCharacterSplitter {
    async fn split_text(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.split(text))
    }

    fn name(&self) -> &'static str {
        "recursive"
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching it to the start of each following piece.
/// An empty separator splits into single characters.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push(text[last..idx].to_string());
        }
        last = idx;
    }
    pieces.push(text[last..].to_string());
    pieces.retain(|p| !p.is_empty());
    pieces
}
