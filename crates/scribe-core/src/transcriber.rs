use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::InferenceError;

/// Speech-recognition capability: one chunk of raw audio in, its text out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Recognize the text in `audio`. Failures are errors; an empty string
    /// means the chunk was legitimately silent.
    async fn transcribe(&self, audio: Bytes) -> Result<String, InferenceError>;
}
