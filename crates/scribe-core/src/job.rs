use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PlanError, RecordError};
use crate::locator::Locator;
use crate::plan::ChunkPlan;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted progress of one transcription job, keyed by its locator.
///
/// Chunks `0..processed_chunks` have been transcribed and their text appended
/// to `accumulated_text` in index order; the rest are pending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub locator: Locator,
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u64,
    pub processed_chunks: u64,
    pub accumulated_text: String,
    pub status: JobStatus,
    /// Optimistic-concurrency token; `0` until the record is first stored.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh job with nothing processed yet.
    pub fn new(locator: Locator, total_size: u64, chunk_size: u64) -> Result<Self, PlanError> {
        let plan = ChunkPlan::new(total_size, chunk_size)?;
        let now = Utc::now();
        Ok(Self {
            locator,
            total_size,
            chunk_size,
            chunk_count: plan.chunk_count(),
            processed_chunks: 0,
            accumulated_text: String::new(),
            status: JobStatus::Processing,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Complete
    }

    pub fn plan(&self) -> Result<ChunkPlan, PlanError> {
        ChunkPlan::new(self.total_size, self.chunk_size)
    }

    /// Indices handled by the next invocation: at most `parallelism` chunks
    /// starting at the first pending one. Empty once everything is processed.
    pub fn next_window(&self, parallelism: usize) -> Range<u64> {
        let start = self.processed_chunks;
        let end = start
            .saturating_add(parallelism as u64)
            .min(self.chunk_count)
            .max(start);
        start..end
    }

    /// Append one window's chunk texts, which must be in ascending index order.
    ///
    /// Texts are trimmed and joined with a single space; a silent chunk adds no
    /// text but still counts as processed.
    pub fn merge_window<I, S>(&mut self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut merged = 0u64;
        for text in texts {
            let text = text.as_ref().trim();
            if !text.is_empty() {
                if !self.accumulated_text.is_empty() {
                    self.accumulated_text.push(' ');
                }
                self.accumulated_text.push_str(text);
            }
            merged += 1;
        }
        self.processed_chunks = (self.processed_chunks + merged).min(self.chunk_count);
        if self.processed_chunks == self.chunk_count {
            self.status = JobStatus::Complete;
        }
        self.updated_at = Utc::now();
    }

    /// Force completion of a record whose chunks are all processed.
    pub fn mark_complete(&mut self) {
        self.status = JobStatus::Complete;
        self.updated_at = Utc::now();
    }

    /// Check the stored-record invariants for the record stored under `key`.
    pub fn validate(&self, key: &Locator) -> Result<(), RecordError> {
        if &self.locator != key {
            return Err(RecordError::KeyMismatch {
                stored: self.locator.to_string(),
                key: key.to_string(),
            });
        }
        let plan = self.plan()?;
        if plan.chunk_count() != self.chunk_count {
            return Err(RecordError::ChunkCountMismatch {
                stored: self.chunk_count,
                expected: plan.chunk_count(),
            });
        }
        if self.processed_chunks > self.chunk_count {
            return Err(RecordError::ProcessedOverflow {
                processed: self.processed_chunks,
                count: self.chunk_count,
            });
        }
        if self.is_complete() && self.processed_chunks < self.chunk_count {
            return Err(RecordError::PrematureComplete {
                processed: self.processed_chunks,
                count: self.chunk_count,
            });
        }
        Ok(())
    }
}
