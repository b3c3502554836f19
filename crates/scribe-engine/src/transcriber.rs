use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use scribe_core::{InferenceError, Transcriber};

const TRANSCRIPTIONS_PATH: &str = "/v1/audio/transcriptions";

/// Connection details for an OpenAI-compatible transcription endpoint.
pub struct TranscriberConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
    pub language: Option<String>,
    /// Name of the uploaded part; servers sniff the container from the extension.
    pub file_name: String,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            language: None,
            file_name: "chunk.mp3".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Sends each chunk as a multipart upload and reads back `{"text": ...}`.
pub struct HttpTranscriber {
    client: Client,
    endpoint: String,
    config: TranscriberConfig,
}

impl HttpTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}{TRANSCRIPTIONS_PATH}", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(&self, audio: Bytes) -> Result<Form, InferenceError> {
        let len = audio.len() as u64;
        let part = Part::stream_with_length(reqwest::Body::from(audio), len)
            .file_name(self.config.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| InferenceError::InvalidRequest(format!("multipart: {e}")))?;

        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", part);
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    fn name(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, audio), fields(model = %self.config.model, bytes = audio.len()))]
    async fn transcribe(&self, audio: Bytes) -> Result<String, InferenceError> {
        let form = self.build_form(audio)?;

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout(self.config.timeout)
            } else {
                InferenceError::Network(e.to_string())
            }
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
        let text = parsed
            .text
            .ok_or_else(|| InferenceError::MalformedResponse("missing text field".into()))?;

        debug!(chars = text.len(), "chunk recognized");
        Ok(text)
    }
}
