use crate::artifacts::ArtifactContent;
use crate::config::OutputFormat;
use crate::error::{CineNotesError, Result};
use crate::transcribe::SegmentResponse;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialSuccess => write!(f, "partial_success"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

/// When a run with failed segments is reported as [`RunStatus::Failure`].
///
/// Without a threshold any error only downgrades the run to
/// `partial_success`, even if every segment failed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregationPolicy {
    /// Share of failed segments (0, 1] at which the run fails.
    pub failure_threshold: Option<f64>,
}

/// Merged transcript of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub status: RunStatus,
    pub transcripts: Vec<String>,
    pub error_logs: Vec<String>,
    pub word_count: usize,
    pub combined_text: String,
}

impl AggregatedResult {
    /// Render the result for [`OutputFormat`]. Transcripts are never byte
    /// content, so the binary format is a type mismatch.
    pub fn to_artifact(&self, format: OutputFormat) -> Result<ArtifactContent> {
        match format {
            OutputFormat::Text => Ok(ArtifactContent::Text(self.combined_text.trim().to_string())),
            OutputFormat::Json => Ok(ArtifactContent::Json(serde_json::to_value(self)?)),
            OutputFormat::Binary => Err(CineNotesError::TypeMismatch(
                "binary output requires byte content, transcripts are text".to_string(),
            )),
        }
    }
}

/// Merge responses in segment order with the default policy.
pub fn aggregate(responses: &[SegmentResponse]) -> AggregatedResult {
    aggregate_with_policy(responses, &AggregationPolicy::default())
}

pub fn aggregate_with_policy(
    responses: &[SegmentResponse],
    policy: &AggregationPolicy,
) -> AggregatedResult {
    let mut transcripts = Vec::new();
    let mut error_logs = Vec::new();
    let mut combined_text = String::new();

    for response in responses {
        match response {
            SegmentResponse::Success { text, .. } => {
                combined_text.push(' ');
                combined_text.push_str(text);
                transcripts.push(text.clone());
            }
            SegmentResponse::Failure { error } => error_logs.push(error.clone()),
            SegmentResponse::Unrecognized { status_code, body } => {
                error_logs.push(
                    CineNotesError::UnexpectedFormat(format!("HTTP {}: {}", status_code, body))
                        .to_string(),
                );
            }
        }
    }

    let word_count = combined_text.split_whitespace().count();

    let status = if error_logs.is_empty() {
        RunStatus::Success
    } else {
        match policy.failure_threshold {
            Some(threshold)
                if error_logs.len() as f64 / responses.len() as f64 >= threshold =>
            {
                RunStatus::Failure
            }
            _ => RunStatus::PartialSuccess,
        }
    };

    AggregatedResult {
        status,
        transcripts,
        error_logs,
        word_count,
        combined_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(text: &str) -> SegmentResponse {
        SegmentResponse::Success {
            status_code: 200,
            text: text.to_string(),
        }
    }

    fn failure(error: &str) -> SegmentResponse {
        SegmentResponse::Failure {
            error: error.to_string(),
        }
    }

    #[test]
    fn test_all_success() {
        let result = aggregate(&[success("hello there"), success("general kenobi")]);

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.combined_text, " hello there general kenobi");
        assert_eq!(result.word_count, 4);
        assert!(result.error_logs.is_empty());
    }

    #[test]
    fn test_mixed_outcomes() {
        let result = aggregate(&[success("a"), failure("timeout"), success("b")]);

        assert_eq!(result.status, RunStatus::PartialSuccess);
        assert_eq!(result.transcripts, vec!["a", "b"]);
        assert_eq!(result.error_logs, vec!["timeout"]);
        assert_eq!(result.combined_text, " a b");
        assert_eq!(result.word_count, 2);
    }

    #[test]
    fn test_all_failures_stay_partial_by_default() {
        let result = aggregate(&[failure("x"), failure("y")]);

        assert_eq!(result.status, RunStatus::PartialSuccess);
        assert_eq!(result.combined_text, "");
        assert_eq!(result.word_count, 0);
        assert_eq!(result.error_logs, vec!["x", "y"]);
    }

    #[test]
    fn test_failure_threshold() {
        let policy = AggregationPolicy {
            failure_threshold: Some(0.5),
        };

        let half = aggregate_with_policy(&[success("a"), failure("x")], &policy);
        assert_eq!(half.status, RunStatus::Failure);

        let third = aggregate_with_policy(&[success("a"), success("b"), failure("x")], &policy);
        assert_eq!(third.status, RunStatus::PartialSuccess);

        let clean = aggregate_with_policy(&[success("a")], &policy);
        assert_eq!(clean.status, RunStatus::Success);
    }

    #[test]
    fn test_unrecognized_recorded_as_error() {
        let result = aggregate(&[
            SegmentResponse::Unrecognized {
                status_code: 200,
                body: "{}".to_string(),
            },
            success("later text"),
        ]);

        assert_eq!(result.status, RunStatus::PartialSuccess);
        assert_eq!(result.error_logs.len(), 1);
        assert!(result.error_logs[0].starts_with("Unexpected response format"));
        assert_eq!(result.transcripts, vec!["later text"]);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(&[]);
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.word_count, 0);
    }

    #[test]
    fn test_to_artifact() {
        let result = aggregate(&[success("a"), success("b")]);

        match result.to_artifact(OutputFormat::Text).unwrap() {
            ArtifactContent::Text(text) => assert_eq!(text, "a b"),
            other => panic!("Expected text, got {:?}", other),
        }
        match result.to_artifact(OutputFormat::Json).unwrap() {
            ArtifactContent::Json(value) => {
                assert_eq!(value["status"], "success");
                assert_eq!(value["word_count"], 2);
            }
            other => panic!("Expected json, got {:?}", other),
        }
        assert!(matches!(
            result.to_artifact(OutputFormat::Binary),
            Err(CineNotesError::TypeMismatch(_))
        ));
    }
}
