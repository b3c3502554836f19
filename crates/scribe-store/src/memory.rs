use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use scribe_core::{JobRecord, Locator};

use crate::error::StoreError;
use crate::jobs::{decode_record, encode_next, JobStore};

/// Process-local [`JobStore`]. Records are kept in serialized form so loads
/// go through the same validation as the SQLite store.
#[derive(Default)]
pub struct MemoryJobStore {
    records: DashMap<String, (u64, String)>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store raw JSON under `key`, bypassing encoding. Used to simulate
    /// records written by other tools.
    pub fn insert_raw(&self, key: &str, version: u64, raw: impl Into<String>) {
        let _ = self.records.insert(key.to_string(), (version, raw.into()));
    }
}

impl JobStore for MemoryJobStore {
    fn get(&self, locator: &Locator) -> Result<Option<JobRecord>, StoreError> {
        match self.records.get(locator.as_str()) {
            None => Ok(None),
            Some(entry) => {
                let (version, raw) = entry.value();
                decode_record(locator, raw, *version).map(Some)
            }
        }
    }

    fn put(&self, record: &JobRecord) -> Result<JobRecord, StoreError> {
        let (next, raw) = encode_next(record)?;
        let key = record.locator.as_str();

        match self.records.entry(key.to_string()) {
            Entry::Vacant(slot) if record.version == 0 => {
                let _ = slot.insert((next.version, raw));
            }
            Entry::Occupied(mut slot) if record.version != 0 && slot.get().0 == record.version => {
                let _ = slot.insert((next.version, raw));
            }
            Entry::Occupied(_) if record.version == 0 => {
                return Err(StoreError::Conflict(format!("job {key} already exists")));
            }
            _ => {
                return Err(StoreError::Conflict(format!(
                    "job {key} changed since version {}",
                    record.version
                )));
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator() -> Locator {
        Locator::from_raw("https://example.com/talk.mp3")
    }

    #[test]
    fn create_update_get() {
        let store = MemoryJobStore::new();
        assert!(store.get(&locator()).unwrap().is_none());

        let mut record = store
            .put(&JobRecord::new(locator(), 10, 5).unwrap())
            .unwrap();
        record.merge_window(["hi"]);
        let record = store.put(&record).unwrap();
        assert_eq!(record.version, 2);

        let fetched = store.get(&locator()).unwrap().unwrap();
        assert_eq!(fetched, record);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn conflicts_match_sqlite_semantics() {
        let store = MemoryJobStore::new();
        let created = store.put(&JobRecord::new(locator(), 10, 5).unwrap()).unwrap();
        assert!(matches!(
            store.put(&JobRecord::new(locator(), 10, 5).unwrap()),
            Err(StoreError::Conflict(_))
        ));

        store.put(&created).unwrap();
        assert!(matches!(store.put(&created), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn update_of_missing_record_conflicts() {
        let store = MemoryJobStore::new();
        let mut record = JobRecord::new(locator(), 10, 5).unwrap();
        record.version = 3;
        assert!(matches!(store.put(&record), Err(StoreError::Conflict(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn raw_garbage_is_corrupt() {
        let store = MemoryJobStore::new();
        store.insert_raw(locator().as_str(), 1, "not json");
        assert!(matches!(
            store.get(&locator()),
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
