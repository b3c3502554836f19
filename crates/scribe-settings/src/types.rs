//! Settings types. Every struct carries `#[serde(default)]` so a partial
//! settings file only needs the keys it changes.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use scribe_core::{DEFAULT_CHUNK_SIZE, DEFAULT_PARALLELISM};

use crate::errors::{Result, SettingsError};

/// Accepted `job.chunkSize` values (1 KiB to 100 MiB).
pub const CHUNK_SIZE_BOUNDS: (u64, u64) = (1024, 104_857_600);

/// Accepted `job.parallelism` values.
pub const PARALLELISM_BOUNDS: (usize, usize) = (1, 64);

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScribeSettings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub job: JobSettings,
    pub source: SourceSettings,
    pub transcription: TranscriptionSettings,
    pub logging: LoggingSettings,
}

impl ScribeSettings {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let (min, max) = CHUNK_SIZE_BOUNDS;
        if !(min..=max).contains(&self.job.chunk_size) {
            return Err(SettingsError::InvalidValue(format!(
                "job.chunkSize {} outside {min}..={max}",
                self.job.chunk_size
            )));
        }
        let (min, max) = PARALLELISM_BOUNDS;
        if !(min..=max).contains(&self.job.parallelism) {
            return Err(SettingsError::InvalidValue(format!(
                "job.parallelism {} outside {min}..={max}",
                self.job.parallelism
            )));
        }
        url::Url::parse(&self.transcription.base_url).map_err(|e| {
            SettingsError::InvalidValue(format!(
                "transcription.baseUrl {:?}: {e}",
                self.transcription.base_url
            ))
        })?;
        Ok(())
    }

    /// Database path; relative paths resolve against `home`.
    pub fn db_path(&self, home: &Path) -> PathBuf {
        let path = Path::new(&self.store.db_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            home.join(path)
        }
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    pub port: u16,
    /// Upper bound on one invocation, including its whole batch.
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            request_timeout_ms: 120_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// SQLite job database (relative to `~/.scribe`).
    pub db_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: "jobs.db".to_string(),
        }
    }
}

/// Chunking policy applied to new jobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSettings {
    /// Bytes per chunk. Only affects jobs created after a change.
    pub chunk_size: u64,
    /// Chunks fetched and transcribed concurrently per invocation.
    pub parallelism: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceSettings {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: "scribe/0.1".to_string(),
        }
    }
}

/// Speech-recognition endpoint (OpenAI-compatible transcription API).
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    pub base_url: String,
    pub model: String,
    /// Bearer token. Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    /// Optional ISO-639-1 hint passed to the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            timeout_ms: 60_000,
            language: None,
        }
    }
}

impl fmt::Debug for TranscriptionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_ms", &self.timeout_ms)
            .field("language", &self.language)
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence.
    pub level: String,
    /// JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}
