use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use scribe_engine::JobController;

use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<JobController>,
    /// Deadline for one invocation; exceeding it drops the unfinished window.
    pub request_timeout: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::transcribe))
        .route("/transcribe", get(handlers::transcribe))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and start serving. Returns a handle for shutdown.
pub async fn start(
    config: ServerConfig,
    controller: Arc<JobController>,
) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(AppState {
        controller,
        request_timeout: config.request_timeout,
    });
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "scribe server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        port: local_addr.port(),
        shutdown: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`; keeps the server task alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.server).await {
            tracing::warn!(error = %e, "server task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_core::{Locator, SourceError};
    use scribe_engine::mock::{EchoTranscriber, MockAudioSource};
    use scribe_engine::JobPolicy;
    use scribe_store::{JobStore, MemoryJobStore};

    const AUDIO: &str = "https://example.com/talk.mp3";

    async fn serve(source: MockAudioSource) -> (ServerHandle, Arc<MemoryJobStore>) {
        serve_with_timeout(source, ServerConfig::default().request_timeout).await
    }

    async fn serve_with_timeout(
        source: MockAudioSource,
        request_timeout: Duration,
    ) -> (ServerHandle, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let controller = Arc::new(JobController::new(
            store.clone(),
            Arc::new(source),
            Arc::new(EchoTranscriber::new()),
            JobPolicy::default(),
        ));
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0, // Random port
            request_timeout,
        };
        (start(config, controller).await.unwrap(), store)
    }

    async fn call(handle: &ServerHandle, path: &str, audio: Option<&str>) -> (u16, serde_json::Value) {
        let mut req = reqwest::Client::new().get(format!("http://{}{path}", handle.addr));
        if let Some(audio) = audio {
            req = req.query(&[("audioUrl", audio)]);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn server_starts_and_serves_health() {
        let (handle, _) = serve(MockAudioSource::new(10)).await;
        assert!(handle.port > 0);

        let (status, body) = call(&handle, "/health", None).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn job_runs_to_completion_over_http() {
        let (handle, _) = serve(MockAudioSource::new(6_000_000)).await;

        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 201);
        assert_eq!(body["chunkCount"], 12);

        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "processing");
        assert_eq!(body["processedChunks"], 5);
        assert_eq!(body["chunkCount"], 12);

        // Root path is the same endpoint.
        let (_, body) = call(&handle, "/", Some(AUDIO)).await;
        assert_eq!(body["processedChunks"], 10);
        let (_, body) = call(&handle, "/", Some(AUDIO)).await;
        assert_eq!(body["status"], "complete");
        assert_eq!(body["processedChunks"], 12);

        let (status, done) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 200);
        assert_eq!(done, serde_json::json!({ "status": "complete", "result": body["result"] }));
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn bad_locators_are_400() {
        let (handle, store) = serve(MockAudioSource::new(10)).await;

        for audio in [None, Some(""), Some("not a url"), Some("ftp://example.com/a.mp3")] {
            let (status, body) = call(&handle, "/transcribe", audio).await;
            assert_eq!(status, 400, "{audio:?}");
            assert!(body["error"].is_string());
        }
        assert!(store.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn unreachable_source_is_400_without_record() {
        let (handle, store) =
            serve(MockAudioSource::unreachable(SourceError::Status { status: 404 })).await;

        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("404"));
        assert!(store.get(&Locator::from_raw(AUDIO)).unwrap().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn probe_network_failure_is_500_without_record() {
        let (handle, store) = serve(MockAudioSource::unreachable(SourceError::Network(
            "connection refused".into(),
        )))
        .await;

        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 500);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
        assert!(store.get(&Locator::from_raw(AUDIO)).unwrap().is_none());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn slow_window_times_out_with_json_error() {
        let (handle, store) = serve_with_timeout(
            MockAudioSource::new(2_000_000).delay_at(0, Duration::from_secs(30)),
            Duration::from_millis(100),
        )
        .await;

        assert_eq!(call(&handle, "/transcribe", Some(AUDIO)).await.0, 201);
        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 504);
        assert!(body["error"].as_str().unwrap().contains("timed out"));

        let record = store.get(&Locator::from_raw(AUDIO)).unwrap().unwrap();
        assert_eq!(record.processed_chunks, 0);
        assert_eq!(record.version, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn chunk_failure_is_500_and_progress_kept() {
        let (handle, store) = serve(MockAudioSource::new(2_000_000).fail_at(524_288)).await;

        assert_eq!(call(&handle, "/transcribe", Some(AUDIO)).await.0, 201);
        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 500);
        assert!(body["error"].as_str().unwrap().contains("chunk 1"));

        let record = store.get(&Locator::from_raw(AUDIO)).unwrap().unwrap();
        assert_eq!(record.processed_chunks, 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn corrupt_record_is_500() {
        let (handle, store) = serve(MockAudioSource::new(10)).await;
        store.insert_raw(AUDIO, 1, "{not json");

        let (status, body) = call(&handle, "/transcribe", Some(AUDIO)).await;
        assert_eq!(status, 500);
        assert!(body["error"].is_string());
        handle.shutdown().await;
    }
}
