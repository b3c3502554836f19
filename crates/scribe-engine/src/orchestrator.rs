use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use tracing::{debug, info, instrument, warn};

use scribe_core::{AudioSource, ByteRange, JobRecord, Locator, Transcriber};
use scribe_store::JobStore;

use crate::error::EngineError;
use crate::lifecycle::JobOutcome;

/// Advances a processing job by one window of chunks per invocation.
///
/// The window is fetched and transcribed concurrently, merged in index order
/// and persisted with a single store write. Any chunk failure aborts the
/// invocation before anything is written, so the same window is redone on the
/// next call.
pub struct BatchOrchestrator {
    store: Arc<dyn JobStore>,
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    parallelism: usize,
}

impl BatchOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        parallelism: usize,
    ) -> Self {
        Self {
            store,
            source,
            transcriber,
            parallelism: parallelism.max(1),
        }
    }

    #[instrument(
        skip(self, record),
        fields(locator = %record.locator, processed = record.processed_chunks, chunk_count = record.chunk_count)
    )]
    pub async fn advance(&self, mut record: JobRecord) -> Result<JobOutcome, EngineError> {
        let window = record.next_window(self.parallelism);

        if window.is_empty() {
            record.mark_complete();
            let stored = self.store.put(&record)?;
            warn!("processing job had no pending chunks, marked complete");
            return Ok(JobOutcome::Complete {
                result: stored.accumulated_text,
            });
        }

        let plan = record.plan()?;
        let ranges: Vec<(u64, ByteRange)> = window
            .clone()
            .filter_map(|index| plan.range(index).map(|range| (index, range)))
            .collect();

        let started = Instant::now();
        // try_join_all yields results in input order and drops the remaining
        // chunk futures on the first error.
        let texts = try_join_all(
            ranges
                .iter()
                .map(|&(index, range)| self.process_chunk(&record.locator, index, range)),
        )
        .await?;

        record.merge_window(&texts);
        let stored = self.store.put(&record)?;

        info!(
            window_start = window.start,
            window_end = window.end,
            processed = stored.processed_chunks,
            status = %stored.status,
            transcriber = self.transcriber.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "window merged"
        );

        Ok(JobOutcome::Progress {
            status: stored.status,
            result: stored.accumulated_text,
            processed_chunks: stored.processed_chunks,
            chunk_count: stored.chunk_count,
        })
    }

    async fn process_chunk(
        &self,
        locator: &Locator,
        index: u64,
        range: ByteRange,
    ) -> Result<String, EngineError> {
        let audio = self
            .source
            .fetch_range(locator, range)
            .await
            .map_err(|source| EngineError::ChunkFetch { index, source })?;
        let bytes = audio.len();

        let text = self
            .transcriber
            .transcribe(audio)
            .await
            .map_err(|source| EngineError::ChunkTranscribe { index, source })?;

        debug!(index, bytes, chars = text.len(), "chunk done");
        Ok(text)
    }
}
