use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;

use scribe_engine::{HttpAudioSource, HttpTranscriber, JobController, JobPolicy, TranscriberConfig};
use scribe_settings::ScribeSettings;
use scribe_store::{Database, SqliteJobStore};
use scribe_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Resumable chunked audio transcription service", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.scribe/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => scribe_settings::load_settings_from_path(path),
        None => scribe_settings::load_settings(),
    }
    .context("failed to load settings")?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    init_telemetry(&TelemetryConfig::with_level(
        &settings.logging.level,
        settings.logging.json,
    ));
    tracing::info!("starting scribe");

    let controller = build_controller(&settings)?;

    let handle = scribe_server::start(
        scribe_server::ServerConfig {
            host: settings.server.host.clone(),
            port: settings.server.port,
            request_timeout: Duration::from_millis(settings.server.request_timeout_ms),
        },
        Arc::new(controller),
    )
    .await
    .context("failed to start server")?;

    tracing::info!(addr = %handle.addr, "scribe ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

fn build_controller(settings: &ScribeSettings) -> anyhow::Result<JobController> {
    let db_path = settings.db_path(&scribe_settings::scribe_home());
    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open job store at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "job store opened");

    let source = HttpAudioSource::new(
        Duration::from_millis(settings.source.timeout_ms),
        &settings.source.user_agent,
    )?;

    let t = &settings.transcription;
    let transcriber = HttpTranscriber::new(TranscriberConfig {
        base_url: t.base_url.clone(),
        model: t.model.clone(),
        api_key: t.api_key.clone().map(SecretString::from),
        timeout: Duration::from_millis(t.timeout_ms),
        language: t.language.clone(),
        ..Default::default()
    })?;
    tracing::info!(endpoint = transcriber.endpoint(), model = %t.model, "transcriber configured");

    Ok(JobController::new(
        Arc::new(SqliteJobStore::new(db)),
        Arc::new(source),
        Arc::new(transcriber),
        JobPolicy {
            chunk_size: settings.job.chunk_size,
            parallelism: settings.job.parallelism,
        },
    ))
}
