//! Job lifecycle: create on first sight, advance while processing, serve when complete.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use scribe_core::{
    AudioSource, JobRecord, JobStatus, Locator, SourceError, Transcriber, DEFAULT_CHUNK_SIZE,
    DEFAULT_PARALLELISM,
};
use scribe_store::JobStore;

use crate::error::EngineError;
use crate::orchestrator::BatchOrchestrator;

/// What a single invocation did for a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A new job record was written; no chunk was processed.
    Created { chunk_count: u64 },
    /// The job was already complete; nothing was fetched or transcribed.
    Complete { result: String },
    /// One window was processed and persisted.
    Progress {
        status: JobStatus,
        result: String,
        processed_chunks: u64,
        chunk_count: u64,
    },
}

/// Chunking parameters applied to newly created jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobPolicy {
    pub chunk_size: u64,
    pub parallelism: usize,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

/// Entry point for one invocation against a locator.
pub struct JobController {
    store: Arc<dyn JobStore>,
    source: Arc<dyn AudioSource>,
    orchestrator: BatchOrchestrator,
    policy: JobPolicy,
}

impl JobController {
    pub fn new(
        store: Arc<dyn JobStore>,
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        policy: JobPolicy,
    ) -> Self {
        let orchestrator = BatchOrchestrator::new(
            store.clone(),
            source.clone(),
            transcriber,
            policy.parallelism,
        );
        Self {
            store,
            source,
            orchestrator,
            policy,
        }
    }

    /// Validate a raw locator and run one invocation for it.
    pub async fn handle(&self, raw: &str) -> Result<JobOutcome, EngineError> {
        let locator = Locator::parse(raw)?;
        self.lookup(&locator).await
    }

    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn lookup(&self, locator: &Locator) -> Result<JobOutcome, EngineError> {
        match self.store.get(locator)? {
            None => self.create_job(locator).await,
            Some(record) if record.is_complete() => Ok(JobOutcome::Complete {
                result: record.accumulated_text,
            }),
            Some(record) => self.orchestrator.advance(record).await,
        }
    }

    /// Probe the source and persist a fresh record. Nothing is written when
    /// the probe fails. An error status or unusable size is the caller's
    /// problem; a transport failure is ours.
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn create_job(&self, locator: &Locator) -> Result<JobOutcome, EngineError> {
        let meta = self.source.probe(locator).await.map_err(|e| {
            warn!(error = %e, kind = e.error_kind(), "source probe failed");
            match e {
                SourceError::Network(_) | SourceError::Timeout(_) => EngineError::Probe(e),
                _ => EngineError::SourceUnreachable(e),
            }
        })?;
        if meta.total_size == 0 {
            return Err(EngineError::SourceUnreachable(SourceError::MissingSize(
                "declared size is zero".into(),
            )));
        }

        let record = JobRecord::new(locator.clone(), meta.total_size, self.policy.chunk_size)?;
        let stored = self.store.put(&record)?;

        info!(
            total_size = stored.total_size,
            chunk_size = stored.chunk_size,
            chunk_count = stored.chunk_count,
            "job created"
        );
        Ok(JobOutcome::Created {
            chunk_count: stored.chunk_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{EchoTranscriber, MockAudioSource};
    use scribe_store::MemoryJobStore;

    const URL: &str = "https://example.com/talk.mp3";

    fn controller(
        source: MockAudioSource,
    ) -> (
        JobController,
        Arc<MemoryJobStore>,
        Arc<MockAudioSource>,
        Arc<EchoTranscriber>,
    ) {
        let store = Arc::new(MemoryJobStore::new());
        let source = Arc::new(source);
        let transcriber = Arc::new(EchoTranscriber::new());
        let controller = JobController::new(
            store.clone(),
            source.clone(),
            transcriber.clone(),
            JobPolicy::default(),
        );
        (controller, store, source, transcriber)
    }

    #[tokio::test]
    async fn first_call_creates_without_processing() {
        let (ctl, store, source, transcriber) = controller(MockAudioSource::new(6_000_000));

        let outcome = ctl.handle(URL).await.unwrap();
        assert_eq!(outcome, JobOutcome::Created { chunk_count: 12 });
        assert_eq!(source.probe_calls(), 1);
        assert_eq!(source.fetch_calls(), 0);
        assert_eq!(transcriber.call_count(), 0);

        let record = store.get(&Locator::from_raw(URL)).unwrap().unwrap();
        assert_eq!(record.processed_chunks, 0);
        assert_eq!(record.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn full_lifecycle_of_long_job() {
        let (ctl, _store, source, transcriber) = controller(MockAudioSource::new(6_000_000));

        assert!(matches!(ctl.handle(URL).await.unwrap(), JobOutcome::Created { .. }));
        for expected in [5, 10, 12] {
            match ctl.handle(URL).await.unwrap() {
                JobOutcome::Progress {
                    processed_chunks, ..
                } => assert_eq!(processed_chunks, expected),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        let done = ctl.handle(URL).await.unwrap();
        let JobOutcome::Complete { result } = done else {
            panic!("expected completed job, got {done:?}");
        };
        assert!(result.starts_with("0-524287 524288-"));
        assert_eq!(source.probe_calls(), 1);
        assert_eq!(source.fetch_calls(), 12);
        assert_eq!(transcriber.call_count(), 12);
    }

    #[tokio::test]
    async fn completed_job_is_served_without_work() {
        let (ctl, _store, source, transcriber) = controller(MockAudioSource::new(1_500_000));
        ctl.handle(URL).await.unwrap();
        ctl.handle(URL).await.unwrap();
        let fetches = source.fetch_calls();

        for _ in 0..3 {
            assert!(matches!(ctl.handle(URL).await.unwrap(), JobOutcome::Complete { .. }));
        }
        assert_eq!(source.fetch_calls(), fetches);
        assert_eq!(transcriber.call_count(), fetches);
    }

    #[tokio::test]
    async fn unreachable_source_creates_nothing() {
        let (ctl, store, _source, _t) =
            controller(MockAudioSource::unreachable(SourceError::Status { status: 404 }));

        let err = ctl.handle(URL).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(err, EngineError::SourceUnreachable(_)));
        assert!(store.is_empty());

        // Still nothing on the next attempt.
        assert!(ctl.handle(URL).await.is_err());
        assert!(store.get(&Locator::from_raw(URL)).unwrap().is_none());
    }

    #[tokio::test]
    async fn probe_transport_failure_is_server_side() {
        for error in [
            SourceError::Network("connection refused".into()),
            SourceError::Timeout(std::time::Duration::from_secs(30)),
        ] {
            let (ctl, store, _source, _t) = controller(MockAudioSource::unreachable(error));
            let err = ctl.handle(URL).await.unwrap_err();
            assert!(matches!(err, EngineError::Probe(_)));
            assert!(!err.is_client_error());
            assert!(store.is_empty());
        }
    }

    #[tokio::test]
    async fn zero_size_source_is_unreachable() {
        let (ctl, store, _source, _t) = controller(MockAudioSource::new(0));
        let err = ctl.handle(URL).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::SourceUnreachable(SourceError::MissingSize(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_locator_rejected_before_store() {
        let (ctl, store, source, _t) = controller(MockAudioSource::new(10));
        for raw in ["", "   ", "not a url", "ftp://example.com/a.mp3"] {
            let err = ctl.handle(raw).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidLocator(_)), "{raw:?}");
            assert!(err.is_client_error());
        }
        assert_eq!(source.probe_calls(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn locators_are_distinct_keys() {
        let (ctl, store, _source, _t) = controller(MockAudioSource::new(10));
        ctl.handle(URL).await.unwrap();
        ctl.handle(&format!("{URL}?v=2")).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn racing_create_reports_conflict() {
        let (ctl, store, _source, _t) = controller(MockAudioSource::new(10));
        let locator = Locator::from_raw(URL);
        store
            .put(&JobRecord::new(locator.clone(), 10, DEFAULT_CHUNK_SIZE).unwrap())
            .unwrap();

        let err = ctl.create_job(&locator).await.unwrap_err();
        assert!(err.is_conflict());
    }
}
