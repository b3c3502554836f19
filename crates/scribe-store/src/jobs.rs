use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use scribe_core::{JobRecord, Locator};

use crate::database::Database;
use crate::error::StoreError;

/// Key-value persistence for job records, keyed by the exact locator string.
///
/// Writes are version-checked: a record read with version `n` can only be
/// written back while the stored version is still `n`. A record with version
/// `0` is new and can only be inserted, never overwrite an existing key.
pub trait JobStore: Send + Sync {
    fn get(&self, locator: &Locator) -> Result<Option<JobRecord>, StoreError>;

    /// Persist `record`, returning it with its new version.
    /// Fails with [`StoreError::Conflict`] if another writer got there first.
    fn put(&self, record: &JobRecord) -> Result<JobRecord, StoreError>;
}

/// Parse and validate a stored record. Malformed records are rejected
/// rather than handed to the orchestrator.
pub(crate) fn decode_record(key: &Locator, raw: &str, version: u64) -> Result<JobRecord, StoreError> {
    let mut record: JobRecord = serde_json::from_str(raw)
        .map_err(|e| StoreError::corrupt(key.as_str(), format!("invalid JSON: {e}")))?;
    record
        .validate(key)
        .map_err(|e| StoreError::corrupt(key.as_str(), e))?;
    record.version = version;
    Ok(record)
}

/// Next stored form of `record` and its JSON encoding.
pub(crate) fn encode_next(record: &JobRecord) -> Result<(JobRecord, String), StoreError> {
    let mut next = record.clone();
    next.version = record.version + 1;
    next.updated_at = Utc::now();
    let raw = serde_json::to_string(&next)?;
    Ok((next, raw))
}

/// SQLite-backed [`JobStore`].
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl JobStore for SqliteJobStore {
    #[instrument(skip(self), fields(locator = %locator))]
    fn get(&self, locator: &Locator) -> Result<Option<JobRecord>, StoreError> {
        let row: Option<(String, i64)> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT record, version FROM jobs WHERE locator = ?1",
                    [locator.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?)
        })?;

        match row {
            None => Ok(None),
            Some((raw, version)) => {
                let version = u64::try_from(version).map_err(|_| {
                    StoreError::corrupt(locator.as_str(), format!("negative version {version}"))
                })?;
                decode_record(locator, &raw, version).map(Some)
            }
        }
    }

    #[instrument(skip(self, record), fields(locator = %record.locator, version = record.version))]
    fn put(&self, record: &JobRecord) -> Result<JobRecord, StoreError> {
        let (next, raw) = encode_next(record)?;
        let updated_at = next.updated_at.to_rfc3339();
        let key = record.locator.as_str();

        self.db.with_conn(|conn| {
            if record.version == 0 {
                let inserted = conn.execute(
                    "INSERT INTO jobs (locator, record, version, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(locator) DO NOTHING",
                    rusqlite::params![key, raw, next.version as i64, updated_at],
                )?;
                if inserted == 0 {
                    return Err(StoreError::Conflict(format!("job {key} already exists")));
                }
            } else {
                let updated = conn.execute(
                    "UPDATE jobs SET record = ?2, version = ?3, updated_at = ?4
                     WHERE locator = ?1 AND version = ?5",
                    rusqlite::params![
                        key,
                        raw,
                        next.version as i64,
                        updated_at,
                        record.version as i64,
                    ],
                )?;
                if updated == 0 {
                    return Err(StoreError::Conflict(format!(
                        "job {key} changed since version {}",
                        record.version
                    )));
                }
            }
            Ok(())
        })?;

        debug!(version = next.version, "job record stored");
        Ok(next)
    }
}
