//! Mock API tests for the transcription and embedding clients
//!
//! A local wiremock server stands in for the HuggingFace Inference API and
//! the Google Generative AI embeddings endpoint.

use cinenotes::artifacts::RunContext;
use cinenotes::audio::{MediaBuffer, Segment};
use cinenotes::config::PipelineConfig;
use cinenotes::error::CineNotesError;
use cinenotes::pipeline::TranscriptionPipeline;
use cinenotes::text::{Embedder, GoogleEmbedder, SemanticSplitter, TextSplitter};
use cinenotes::transcribe::{Dispatcher, HuggingFaceClient, RunStatus, SegmentResponse, Transcriber};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/openai/whisper-large-v3-turbo";

fn segment_file(dir: &Path, index: usize, content: &str) -> Segment {
    let path = dir.join(format!("chunk_{:04}.wav", index));
    std::fs::write(&path, content).unwrap();
    Segment {
        index,
        path,
        start: Duration::from_secs(index as u64 * 60),
        end: Duration::from_secs((index as u64 + 1) * 60),
    }
}

fn client(server: &MockServer) -> HuggingFaceClient {
    HuggingFaceClient::new("hf_test".to_string())
        .unwrap()
        .with_base_url(server.uri())
}

// ============================================================================
// HuggingFace Whisper Mock Tests
// ============================================================================

mod huggingface_tests {
    use super::*;

    #[tokio::test]
    async fn test_success_sends_bearer_and_wav() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("authorization", "Bearer hf_test"))
            .and(header("content-type", "audio/wav"))
            .and(body_string("RIFF-segment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " hello world"})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let segment = segment_file(dir.path(), 0, "RIFF-segment");

        let response = tokio_test::assert_ok!(client(&server).transcribe(&segment).await);
        assert_eq!(
            response,
            SegmentResponse::Success {
                status_code: 200,
                text: " hello world".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_http_error_carries_service_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "Model is loading"})),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let segment = segment_file(dir.path(), 0, "data");

        let err = tokio_test::assert_err!(client(&server).transcribe(&segment).await);
        match err {
            CineNotesError::HttpStatus { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Model is loading");
            }
            other => panic!("Expected HttpStatus, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_body_without_text_is_unrecognized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"estimated_time": 20})))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let segment = segment_file(dir.path(), 0, "data");

        let response = client(&server).transcribe(&segment).await.unwrap();
        assert!(matches!(
            response,
            SegmentResponse::Unrecognized { status_code: 200, .. }
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"text": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let segment = segment_file(dir.path(), 0, "data");
        let client = client(&server)
            .with_timeout(Duration::from_millis(200))
            .unwrap();

        let result = client.transcribe(&segment).await;
        assert!(matches!(result, Err(CineNotesError::Transport(_))));
    }

    #[tokio::test]
    async fn test_dispatch_keeps_order_and_isolates_failures() {
        let server = MockServer::start().await;
        let replies = [
            ("seg0", ResponseTemplate::new(200).set_body_json(json!({"text": "zero"})), 300),
            ("seg1", ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})), 150),
            ("seg2", ResponseTemplate::new(200).set_body_json(json!({"text": "two"})), 0),
        ];
        for (body, template, delay_ms) in replies {
            Mock::given(method("POST"))
                .and(path(MODEL_PATH))
                .and(body_string(body))
                .respond_with(template.set_delay(Duration::from_millis(delay_ms)))
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let segments: Vec<Segment> = (0..3)
            .map(|i| segment_file(dir.path(), i, &format!("seg{i}")))
            .collect();

        let dispatcher = Dispatcher::new(Box::new(client(&server))).with_progress(false);
        let responses = dispatcher.dispatch(&segments).await;

        assert_eq!(responses.len(), 3);
        assert_eq!(
            responses[0],
            SegmentResponse::Success {
                status_code: 200,
                text: "zero".to_string()
            }
        );
        match &responses[1] {
            SegmentResponse::Failure { error } => assert!(error.contains("boom")),
            other => panic!("Expected failure, got {other:?}"),
        }
        assert_eq!(
            responses[2],
            SegmentResponse::Success {
                status_code: 200,
                text: "two".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_pipeline_against_mock_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hi"})))
            .expect(3)
            .mount(&server)
            .await;

        let scratch_root = TempDir::new().unwrap();
        let artifacts = TempDir::new().unwrap();
        let config = PipelineConfig {
            split_minutes: 5,
            scratch_root: Some(scratch_root.path().to_path_buf()),
            show_progress: false,
            ..PipelineConfig::default()
        };
        let pipeline = TranscriptionPipeline::new(
            Box::new(client(&server)),
            config,
            RunContext::new(artifacts.path()),
        )
        .unwrap();

        // 12 minutes at 10 Hz.
        let buffer = MediaBuffer::new(10, 1, vec![0; 7200]);
        let (result, stats) = pipeline.transcribe_buffer(&buffer).await.unwrap();

        assert_eq!(stats.total_segments, 3);
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.combined_text, " hi hi hi");
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);

        let saved = pipeline.save_result(&result).unwrap();
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "hi hi hi");
    }
}

// ============================================================================
// Google Embeddings Mock Tests
// ============================================================================

mod embedding_tests {
    use super::*;

    const EMBED_PATH: &str = "/v1beta/models/embedding-001:batchEmbedContents";

    fn embedder(server: &MockServer) -> GoogleEmbedder {
        GoogleEmbedder::new("g_test".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_batch_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .and(query_param("key", "g_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{"values": [0.1, 0.2]}, {"values": [0.3, 0.4]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vectors = embedder(&server)
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_api_error_is_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let result = embedder(&server).embed_documents(&["a".to_string()]).await;
        match result {
            Err(CineNotesError::Embedding(message)) => assert_eq!(message, "API key not valid"),
            other => panic!("Expected embedding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_error_page_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .respond_with(
                ResponseTemplate::new(502)
                    .set_body_string("<html><body>Bad Gateway</body></html>"),
            )
            .mount(&server)
            .await;

        let result = embedder(&server).embed_documents(&["a".to_string()]).await;
        match result {
            Err(CineNotesError::Embedding(message)) => {
                assert!(message.contains("HTTP 502"), "{message}");
                assert!(message.contains("Bad Gateway"), "{message}");
            }
            other => panic!("Expected embedding error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{"values": [1.0]}]
            })))
            .mount(&server)
            .await;

        let result = embedder(&server)
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await;
        assert!(matches!(result, Err(CineNotesError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_semantic_splitter_with_google() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(EMBED_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [
                    {"values": [1.0, 0.0]},
                    {"values": [1.0, 0.0]},
                    {"values": [0.0, 1.0]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let splitter = SemanticSplitter::new(Box::new(embedder(&server)));
        let chunks = splitter
            .split_text("Cats purr. Cats nap. Cars honk.")
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Cats purr. Cats nap.", "Cars honk."]);
    }
}
