use scribe_core::{InferenceError, LocatorError, PlanError, SourceError};
use scribe_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidLocator(#[from] LocatorError),

    #[error("source unreachable: {0}")]
    SourceUnreachable(SourceError),

    #[error("source probe failed: {0}")]
    Probe(SourceError),

    #[error("chunk {index} fetch failed: {source}")]
    ChunkFetch { index: u64, source: SourceError },

    #[error("chunk {index} transcription failed: {source}")]
    ChunkTranscribe { index: u64, source: InferenceError },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid chunk plan: {0}")]
    Plan(#[from] PlanError),
}

impl EngineError {
    /// Bad input or an unusable source at creation time; nothing was stored.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidLocator(_) | Self::SourceUnreachable(_))
    }

    /// Another invocation wrote the job record first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::Conflict(_)))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidLocator(_) => "invalid_locator",
            Self::SourceUnreachable(_) => "source_unreachable",
            Self::Probe(_) => "probe",
            Self::ChunkFetch { .. } => "chunk_fetch",
            Self::ChunkTranscribe { .. } => "chunk_transcribe",
            Self::Store(StoreError::Conflict(_)) => "conflict",
            Self::Store(_) => "store",
            Self::Plan(_) => "plan",
        }
    }
}
