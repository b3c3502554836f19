use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use scribe_core::{
    AudioSource, ByteRange, InferenceError, Locator, SourceError, SourceMetadata, Transcriber,
};

/// Deterministic in-process source for tests without a network.
///
/// Each fetched range returns its own bounds as bytes (`"start-end"`), so an
/// echoing transcriber makes the merged text show exactly which ranges were
/// read and in what order.
pub struct MockAudioSource {
    total_size: u64,
    probe_error: Option<SourceError>,
    failing_starts: HashSet<u64>,
    delays: HashMap<u64, Duration>,
    probe_calls: AtomicUsize,
    fetched: Mutex<Vec<ByteRange>>,
}

impl MockAudioSource {
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            probe_error: None,
            failing_starts: HashSet::new(),
            delays: HashMap::new(),
            probe_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Source whose probe fails with `error`.
    pub fn unreachable(error: SourceError) -> Self {
        Self {
            probe_error: Some(error),
            ..Self::new(0)
        }
    }

    /// Fail the fetch of the range starting at `start`.
    pub fn fail_at(mut self, start: u64) -> Self {
        let _ = self.failing_starts.insert(start);
        self
    }

    /// Delay the fetch of the range starting at `start`.
    pub fn delay_at(mut self, start: u64, delay: Duration) -> Self {
        let _ = self.delays.insert(start, delay);
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::Relaxed)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetched.lock().len()
    }

    pub fn fetched(&self) -> Vec<ByteRange> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    async fn probe(&self, _locator: &Locator) -> Result<SourceMetadata, SourceError> {
        let _ = self.probe_calls.fetch_add(1, Ordering::Relaxed);
        match &self.probe_error {
            Some(e) => Err(e.clone()),
            None => Ok(SourceMetadata {
                total_size: self.total_size,
            }),
        }
    }

    async fn fetch_range(&self, _locator: &Locator, range: ByteRange) -> Result<Bytes, SourceError> {
        self.fetched.lock().push(range);
        if let Some(delay) = self.delays.get(&range.start) {
            tokio::time::sleep(*delay).await;
        }
        if range.end >= self.total_size {
            return Err(SourceError::Status { status: 416 });
        }
        if self.failing_starts.contains(&range.start) {
            return Err(SourceError::Status { status: 503 });
        }
        Ok(Bytes::from(range.to_string()))
    }
}

/// Echoes the chunk bytes back as text.
pub struct EchoTranscriber {
    failing: HashSet<String>,
    silent: HashSet<String>,
    calls: AtomicUsize,
}

impl Default for EchoTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoTranscriber {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            silent: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail when the chunk bytes equal `input`.
    pub fn fail_on(mut self, input: &str) -> Self {
        let _ = self.failing.insert(input.to_string());
        self
    }

    /// Return empty text when the chunk bytes equal `input`.
    pub fn silent_on(mut self, input: &str) -> Self {
        let _ = self.silent.insert(input.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transcriber for EchoTranscriber {
    fn name(&self) -> &str {
        "echo"
    }

    async fn transcribe(&self, audio: Bytes) -> Result<String, InferenceError> {
        let _ = self.calls.fetch_add(1, Ordering::Relaxed);
        let text = String::from_utf8(audio.to_vec())
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;
        if self.failing.contains(&text) {
            return Err(InferenceError::Status {
                status: 500,
                body: format!("mock failure for {text}"),
            });
        }
        if self.silent.contains(&text) {
            return Ok(String::new());
        }
        Ok(text)
    }
}
