//! TTS module: requests to the remote synthesis service.
//!
//! Failures never escape this module as errors. They are appended to the
//! conversation's error log and reported as `false` / an empty list.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::conversation::Role;
use crate::error::{DialogError, SynthesisError};
use crate::store::ConversationDir;
use crate::wire::{MsgpackCodec, TtsBatchRequest, TtsRequest, WireCodec};

/// A synthesized clip for one turn.
#[derive(Debug, Clone)]
pub struct TurnAudio {
    pub role: Role,
    /// 1-based position within the role.
    pub index: usize,
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

impl TurnAudio {
    /// Write the clip, replacing any earlier file.
    pub fn write(&self) -> Result<(), DialogError> {
        fs::write(&self.path, &self.bytes)?;
        Ok(())
    }
}

/// The remote synthesis service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one utterance, returning the encoded audio.
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, SynthesisError>;

    /// Synthesize every utterance of one role in a single round trip.
    async fn synthesize_batch(
        &self,
        request: &TtsBatchRequest,
    ) -> Result<Vec<Vec<u8>>, SynthesisError>;
}

/// HTTP client for the synthesis service.
pub struct HttpSynthesizer {
    http: reqwest::Client,
    single_url: String,
    batch_url: String,
    api_key: String,
    codec: Box<dyn WireCodec>,
}

impl HttpSynthesizer {
    pub fn new(service: &ServiceConfig) -> Result<Self, DialogError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = service.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            single_url: service.single_url.clone(),
            batch_url: service.batch_url.clone(),
            api_key: service.api_key.clone(),
            codec: Box::new(MsgpackCodec),
        })
    }

    /// Replace the wire encoding.
    pub fn with_codec(mut self, codec: impl WireCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// POST an encoded body. Only a 200 counts as success.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, SynthesisError> {
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, self.codec.content_type())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if status != reqwest::StatusCode::OK {
            return Err(SynthesisError::new(
                Some(status.as_u16()),
                String::from_utf8_lossy(&bytes),
            ));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, SynthesisError> {
        let body = self
            .codec
            .encode_single(request)
            .map_err(|e| SynthesisError::new(None, e.to_string()))?;

        tracing::debug!(url = %self.single_url, reference_id = %request.reference_id, "tts request");
        self.post(&self.single_url, body).await
    }

    async fn synthesize_batch(
        &self,
        request: &TtsBatchRequest,
    ) -> Result<Vec<Vec<u8>>, SynthesisError> {
        let body = self
            .codec
            .encode_batch(request)
            .map_err(|e| SynthesisError::new(None, e.to_string()))?;

        tracing::debug!(
            url = %self.batch_url,
            reference_id = %request.reference_id,
            texts = request.texts.len(),
            "tts batch request"
        );
        let response = self.post(&self.batch_url, body).await?;

        self.codec
            .decode_batch(&response)
            .map_err(|e| SynthesisError::new(Some(200), format!("malformed batch response: {}", e)))
    }
}

/// Synthesize one turn to `output`.
///
/// Returns `true` once the clip is on disk. Any failure is appended to
/// `error_log` and reported as `false`.
pub async fn synthesize_to_file(
    synthesizer: &dyn SpeechSynthesizer,
    request: &TtsRequest,
    output: &Path,
    error_log: &Path,
) -> bool {
    let failure = match synthesizer.synthesize(request).await {
        Ok(bytes) => match fs::write(output, bytes) {
            Ok(()) => return true,
            Err(e) => SynthesisError::new(None, format!("failed to write {}: {}", output.display(), e)),
        },
        Err(e) => e,
    };

    let record = format!(
        "Error generating audio for text '{}': {}\nData:\n{}",
        request.text,
        failure,
        payload_json(request)
    );
    append_error_log(error_log, &record);
    false
}

/// Synthesize all `request.texts` as `{role}_turn_{n}.wav` in `dir`.
///
/// Returns the written paths in turn order, or an empty list after logging
/// the failure. A response with a clip count different from the number of
/// texts counts as a failure, and nothing is written in that case.
pub async fn synthesize_batch_to_dir(
    synthesizer: &dyn SpeechSynthesizer,
    request: &TtsBatchRequest,
    dir: &ConversationDir,
    role: Role,
) -> Vec<PathBuf> {
    let failure = match synthesizer.synthesize_batch(request).await {
        Ok(audios) if audios.len() == request.texts.len() => {
            let clips: Vec<TurnAudio> = audios
                .into_iter()
                .enumerate()
                .map(|(i, bytes)| TurnAudio {
                    role,
                    index: i + 1,
                    bytes,
                    path: dir.turn_path(role, i + 1),
                })
                .collect();

            match clips.iter().try_for_each(TurnAudio::write) {
                Ok(()) => return clips.into_iter().map(|c| c.path).collect(),
                Err(e) => SynthesisError::new(None, format!("failed to write batch audio: {}", e)),
            }
        }
        Ok(audios) => SynthesisError::new(
            Some(200),
            format!(
                "batch response holds {} clips for {} texts",
                audios.len(),
                request.texts.len()
            ),
        ),
        Err(e) => e,
    };

    let record = format!(
        "Error generating batch audio: {}\nData:\n{}",
        failure,
        payload_json(request)
    );
    append_error_log(&dir.error_log_path(), &record);
    Vec::new()
}

fn payload_json<T: serde::Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|e| format!("<unserializable payload: {}>", e))
}

/// Append one record to an error log, creating it if needed.
fn append_error_log(path: &Path, record: &str) {
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", record));

    match result {
        Ok(()) => tracing::warn!(log = %path.display(), "synthesis failed, details appended to error log"),
        Err(e) => tracing::error!(log = %path.display(), error = %e, "failed to write error log"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSynthesizer, wav_bytes};
    use crate::wire::{AudioBuffer, MemoryCache, TtsBatchResponse};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use httpmock::prelude::HttpMockRequest;

    fn request(text: &str) -> TtsRequest {
        TtsRequest {
            text: text.to_string(),
            references: Vec::new(),
            reference_id: "voice_a".to_string(),
            normalize: true,
            format: "wav".to_string(),
            use_memory_cache: MemoryCache::Never,
        }
    }

    fn batch(texts: &[&str]) -> TtsBatchRequest {
        TtsBatchRequest {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            references: Vec::new(),
            reference_id: "voice_b".to_string(),
            normalize: true,
            format: "wav".to_string(),
        }
    }

    fn service(server: &MockServer) -> ServiceConfig {
        ServiceConfig {
            single_url: server.url("/v1/tts"),
            batch_url: server.url("/v1/tts/batch"),
            api_key: "test-key".to_string(),
            timeout_secs: Some(5),
        }
    }

    #[tokio::test]
    async fn test_http_single_sends_msgpack_with_bearer() {
        let server = MockServer::start_async().await;
        fn body_is_hello_request(req: &HttpMockRequest) -> bool {
            req.body
                .as_ref()
                .and_then(|b| rmp_serde::from_slice::<TtsRequest>(b).ok())
                .map(|r| r.text == "hello" && r.use_memory_cache == MemoryCache::Never)
                .unwrap_or(false)
        }
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/tts")
                    .header("authorization", "Bearer test-key")
                    .header("content-type", "application/msgpack")
                    .matches(body_is_hello_request);
                then.status(200).body("RIFFdata");
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server)).unwrap();
        let audio = client.synthesize(&request("hello")).await.unwrap();

        assert_eq!(audio, b"RIFFdata");
        mock.assert_async().await;
    }

    struct TaggedCodec;

    impl WireCodec for TaggedCodec {
        fn content_type(&self) -> &'static str {
            "application/x-test"
        }

        fn encode_single(&self, request: &TtsRequest) -> Result<Vec<u8>, DialogError> {
            MsgpackCodec.encode_single(request)
        }

        fn encode_batch(&self, request: &TtsBatchRequest) -> Result<Vec<u8>, DialogError> {
            MsgpackCodec.encode_batch(request)
        }

        fn decode_batch(&self, body: &[u8]) -> Result<Vec<Vec<u8>>, DialogError> {
            MsgpackCodec.decode_batch(body)
        }
    }

    #[tokio::test]
    async fn test_http_uses_codec_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/tts")
                    .header("content-type", "application/x-test");
                then.status(200).body("RIFF");
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server))
            .unwrap()
            .with_codec(TaggedCodec);
        client.synthesize(&request("hello")).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_non_200_is_synthesis_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/tts");
                then.status(500).body("reference voice_a has no audio");
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server)).unwrap();
        let err = client.synthesize(&request("hello")).await.unwrap_err();

        assert_eq!(err.status, Some(500));
        assert_eq!(err.body, "reference voice_a has no audio");
    }

    #[tokio::test]
    async fn test_http_other_success_codes_are_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/tts");
                then.status(202).body("queued");
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server)).unwrap();
        let err = client.synthesize(&request("hello")).await.unwrap_err();
        assert_eq!(err.status, Some(202));
    }

    #[tokio::test]
    async fn test_http_batch_decodes_audios() {
        let server = MockServer::start_async().await;
        let response = TtsBatchResponse {
            audios: vec![AudioBuffer(b"first".to_vec()), AudioBuffer(b"second".to_vec())],
        };
        let body = rmp_serde::to_vec_named(&response).unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/tts/batch")
                    .header("authorization", "Bearer test-key");
                then.status(200).body(body.clone());
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server)).unwrap();
        let audios = client.synthesize_batch(&batch(&["a", "b"])).await.unwrap();

        assert_eq!(audios, vec![b"first".to_vec(), b"second".to_vec()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_batch_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/tts/batch");
                then.status(200).body("not msgpack at all");
            })
            .await;

        let client = HttpSynthesizer::new(&service(&server)).unwrap();
        let err = client.synthesize_batch(&batch(&["a"])).await.unwrap_err();
        assert_eq!(err.status, Some(200));
        assert!(err.body.starts_with("malformed batch response"));
    }

    #[tokio::test]
    async fn test_unreachable_service_has_no_status() {
        let config = ServiceConfig {
            single_url: "http://127.0.0.1:1/v1/tts".to_string(),
            timeout_secs: Some(2),
            ..ServiceConfig::default()
        };
        let client = HttpSynthesizer::new(&config).unwrap();
        let err = client.synthesize(&request("hello")).await.unwrap_err();
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn test_synthesize_to_file_writes_clip() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("user_turn_1.wav");
        let log = dir.path().join("error_log.txt");
        let fake = FakeSynthesizer::new();

        assert!(synthesize_to_file(&fake, &request("hello"), &output, &log).await);
        assert_eq!(fs::read(&output).unwrap(), wav_bytes(&[1]));
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_synthesize_to_file_logs_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("user_turn_1.wav");
        let log = dir.path().join("error_log.txt");
        let fake = FakeSynthesizer::new().failing_on("broken");

        assert!(!synthesize_to_file(&fake, &request("broken"), &output, &log).await);
        assert!(!synthesize_to_file(&fake, &request("broken"), &output, &log).await);
        assert!(!output.exists());

        let contents = fs::read_to_string(&log).unwrap();
        assert_eq!(contents.matches("Error generating audio for text 'broken': 500").count(), 2);
        assert!(contents.contains("\"reference_id\":\"voice_a\""));
        assert!(contents.contains("\"use_memory_cache\":\"never\""));
    }

    #[tokio::test]
    async fn test_batch_to_dir_writes_in_response_order() {
        let root = tempfile::tempdir().unwrap();
        let dir = ConversationDir::new(root.path(), "c1");
        dir.create().unwrap();
        let fake = FakeSynthesizer::new();

        let paths = synthesize_batch_to_dir(&fake, &batch(&["zzz", "aaa"]), &dir, Role::User).await;

        assert_eq!(paths, vec![dir.turn_path(Role::User, 1), dir.turn_path(Role::User, 2)]);
        assert_eq!(fs::read(&paths[0]).unwrap(), wav_bytes(&[1]));
        assert_eq!(fs::read(&paths[1]).unwrap(), wav_bytes(&[2]));
    }

    #[tokio::test]
    async fn test_batch_to_dir_failure_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let dir = ConversationDir::new(root.path(), "c1");
        dir.create().unwrap();
        let fake = FakeSynthesizer::new().failing_on("bad");

        let paths =
            synthesize_batch_to_dir(&fake, &batch(&["fine", "bad"]), &dir, Role::Assistant).await;

        assert!(paths.is_empty());
        assert!(!dir.turn_path(Role::Assistant, 1).exists());
        let contents = fs::read_to_string(dir.error_log_path()).unwrap();
        assert_eq!(contents.matches("Error generating batch audio").count(), 1);
    }

    #[tokio::test]
    async fn test_batch_to_dir_rejects_short_response() {
        let root = tempfile::tempdir().unwrap();
        let dir = ConversationDir::new(root.path(), "c1");
        dir.create().unwrap();
        let fake = FakeSynthesizer::new().with_batch_clip_limit(1);

        let paths = synthesize_batch_to_dir(&fake, &batch(&["a", "b"]), &dir, Role::User).await;

        assert!(paths.is_empty());
        assert!(!dir.turn_path(Role::User, 1).exists());
        let contents = fs::read_to_string(dir.error_log_path()).unwrap();
        assert!(contents.contains("batch response holds 1 clips for 2 texts"));
    }
}
