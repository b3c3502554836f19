use std::time::Duration;

/// Failure while probing or reading the source audio.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source returned status {status}")]
    Status { status: u16 },
    #[error("source did not declare a usable size: {0}")]
    MissingSize(String),
    #[error("range not honored: expected {expected} bytes, got {actual}")]
    RangeMismatch { expected: u64, actual: u64 },
    #[error("source returned range {returned}, requested {requested}")]
    UnexpectedRange { requested: String, returned: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::MissingSize(_) => "missing_size",
            Self::RangeMismatch { .. } => "range_mismatch",
            Self::UnexpectedRange { .. } => "unexpected_range",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Failure reported by the speech-recognition service.
/// A silent chunk is `Ok(String::new())`, never one of these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    #[error("inference service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl InferenceError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Network(_) => "network_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("total size must be greater than zero")]
    EmptySource,
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    #[error("audio URL is missing")]
    Missing,
    #[error("audio URL is not a valid absolute URL: {0}")]
    Invalid(String),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// A stored job record that violates the record invariants.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("invalid chunk plan: {0}")]
    Plan(#[from] PlanError),
    #[error("chunk count {stored} does not match computed {expected}")]
    ChunkCountMismatch { stored: u64, expected: u64 },
    #[error("processed chunks {processed} exceed chunk count {count}")]
    ProcessedOverflow { processed: u64, count: u64 },
    #[error("complete with only {processed} of {count} chunks processed")]
    PrematureComplete { processed: u64, count: u64 },
    #[error("record locator {stored} does not match key {key}")]
    KeyMismatch { stored: String, key: String },
}
