//! The newest-first history collection and its persistence policy.

use super::entry::{EntryId, HistoryEntry};
use super::storage::KeyValueStore;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::record::BusinessCardRecord;
use chrono::{SubsecRound, Utc};
use tracing::{debug, info, warn};

/// Saved scans, newest first, mirrored to one key of a [`KeyValueStore`].
///
/// The whole collection is loaded once on open and held in memory. Every
/// mutation re-serialises the full collection and writes storage *first*;
/// memory only changes once the write succeeded, so a failed save or clear
/// leaves both sides exactly as they were.
pub struct HistoryStore<S: KeyValueStore> {
    storage: S,
    key: String,
    limit: Option<usize>,
    entries: Vec<HistoryEntry>,
}

impl<S: KeyValueStore> HistoryStore<S> {
    /// Open the history stored under `key`, loading it immediately.
    ///
    /// `limit` caps the number of kept entries; `None` keeps everything. A
    /// limit of 0 is raised to 1, since a save always keeps the new entry.
    pub fn open(storage: S, key: impl Into<String>, limit: Option<usize>) -> Self {
        let key = key.into();
        let limit = limit.map(|n| n.max(1));
        let entries = load(&storage, &key);
        info!("Loaded {} history entries from '{}'", entries.len(), key);
        Self {
            storage,
            key,
            limit,
            entries,
        }
    }

    /// Open using the key and limit from `config`.
    pub fn from_config(storage: S, config: &ScanConfig) -> Self {
        Self::open(storage, config.history_key.clone(), config.history_limit)
    }

    /// Discard the in-memory copy and read storage again.
    pub fn reload(&mut self) {
        self.entries = load(&self.storage, &self.key);
        debug!("Reloaded {} history entries", self.entries.len());
    }

    /// Append a new entry built from the displayed image and record.
    ///
    /// Evicts the oldest entries when the limit would be exceeded. On a
    /// storage error nothing changes and the error is returned. A stored id
    /// of `u64::MAX` fails with [`ScanError::StorageCorrupt`].
    pub fn save(
        &mut self,
        image: impl Into<String>,
        record: BusinessCardRecord,
    ) -> Result<HistoryEntry, ScanError> {
        // Millisecond precision is what survives serialisation.
        let captured_at = Utc::now().trunc_subsecs(3);
        let newest = self.entries.first().map(|e| e.id);
        let id = EntryId::next(captured_at, newest).ok_or_else(|| ScanError::StorageCorrupt {
            detail: format!(
                "newest stored id {} leaves no room for another entry; clear the history",
                newest.map(|id| id.to_string()).unwrap_or_default()
            ),
        })?;
        let entry = HistoryEntry {
            id,
            captured_at,
            image_snapshot: image.into(),
            record,
        };

        let keep = match self.limit {
            Some(limit) => limit.saturating_sub(1).min(self.entries.len()),
            None => self.entries.len(),
        };
        let evicted = self.entries.len() - keep;

        let view: Vec<&HistoryEntry> = std::iter::once(&entry)
            .chain(self.entries.iter().take(keep))
            .collect();
        let blob = serde_json::to_vec(&view)
            .map_err(|e| ScanError::Internal(format!("serialising history: {e}")))?;
        self.storage.set(&self.key, &blob)?;

        self.entries.truncate(keep);
        self.entries.insert(0, entry.clone());

        if evicted > 0 {
            warn!(
                "History limit reached: dropped {} oldest entr{}",
                evicted,
                if evicted == 1 { "y" } else { "ies" }
            );
        }
        info!(
            "Saved history entry {} ({} entries, {} bytes)",
            entry.id,
            self.entries.len(),
            blob.len()
        );
        Ok(entry)
    }

    /// All entries, newest first.
    pub fn list(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its id as displayed (decimal digits).
    pub fn select(&self, id: &str) -> Result<&HistoryEntry, ScanError> {
        let not_found = || ScanError::NotFound { id: id.to_string() };
        let wanted: EntryId = id.parse().map_err(|_| not_found())?;
        self.entries
            .iter()
            .find(|e| e.id == wanted)
            .ok_or_else(not_found)
    }

    /// Remove every entry. Clearing an empty history succeeds.
    pub fn clear(&mut self) -> Result<(), ScanError> {
        self.storage.remove(&self.key)?;
        let removed = self.entries.len();
        self.entries.clear();
        info!("Cleared {} history entries", removed);
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Read and decode the collection. Any failure yields an empty history.
fn load<S: KeyValueStore>(storage: &S, key: &str) -> Vec<HistoryEntry> {
    let blob = match storage.get(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Could not read history '{}': {}; starting empty", key, e);
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Vec<HistoryEntry>>(&blob) {
        Ok(mut entries) => {
            entries.sort_by(|a, b| b.id.cmp(&a.id));
            entries
        }
        Err(e) => {
            let err = ScanError::StorageCorrupt {
                detail: e.to_string(),
            };
            warn!("{}; starting with an empty history", err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;

    const KEY: &str = "ideaScanHistory";
    const IMG: &str = "data:image/png;base64,QUJD";

    fn record(name: &str) -> BusinessCardRecord {
        BusinessCardRecord {
            name: name.into(),
            ..Default::default()
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ScanError> {
            Err(ScanError::StorageFailed {
                key: key.into(),
                source: std::io::Error::other("disk on fire"),
            })
        }
        fn set(&self, key: &str, _blob: &[u8]) -> Result<(), ScanError> {
            self.get(key).map(|_| ())
        }
        fn remove(&self, key: &str) -> Result<(), ScanError> {
            self.get(key).map(|_| ())
        }
    }

    #[test]
    fn save_prepends_and_persists() {
        let mem = MemoryStore::new();
        let mut history = HistoryStore::open(mem.clone(), KEY, None);
        assert!(history.is_empty());

        let first = history.save(IMG, record("First")).unwrap();
        let second = history.save(IMG, record("Second")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.list()[0], second);
        assert_eq!(history.list()[1], first);

        let reopened = HistoryStore::open(mem, KEY, None);
        assert_eq!(reopened.list(), history.list());
    }

    #[test]
    fn ids_strictly_increase_even_within_one_millisecond() {
        let mut history = HistoryStore::open(MemoryStore::new(), KEY, None);
        for i in 0..5 {
            history.save(IMG, record(&format!("card {i}"))).unwrap();
        }
        let ids: Vec<_> = history.list().iter().map(|e| e.id).collect();
        assert!(ids.windows(2).all(|w| w[0] > w[1]), "ids: {ids:?}");
    }

    #[test]
    fn limit_evicts_oldest() {
        let mem = MemoryStore::new();
        let mut history = HistoryStore::open(mem.clone(), KEY, Some(2));
        history.save(IMG, record("a")).unwrap();
        history.save(IMG, record("b")).unwrap();
        history.save(IMG, record("c")).unwrap();

        let names: Vec<_> = history.list().iter().map(|e| e.record.name.as_str()).collect();
        assert_eq!(names, ["c", "b"]);
        assert_eq!(HistoryStore::open(mem, KEY, Some(2)).len(), 2);
    }

    #[test]
    fn zero_limit_keeps_one_entry() {
        let mut history = HistoryStore::open(MemoryStore::new(), KEY, Some(0));
        assert_eq!(history.limit(), Some(1));
        history.save(IMG, record("a")).unwrap();
        history.save(IMG, record("b")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.list()[0].record.name, "b");
    }

    #[test]
    fn select_finds_by_id_string() {
        let mut history = HistoryStore::open(MemoryStore::new(), KEY, None);
        let saved = history.save(IMG, record("Jane")).unwrap();
        let found = history.select(&saved.id.to_string()).unwrap();
        assert_eq!(found, &saved);

        assert!(matches!(
            history.select("12345"),
            Err(ScanError::NotFound { .. })
        ));
        assert!(matches!(
            history.select("not-a-number"),
            Err(ScanError::NotFound { .. })
        ));
    }

    #[test]
    fn clear_is_idempotent() {
        let mem = MemoryStore::new();
        let mut history = HistoryStore::open(mem.clone(), KEY, None);
        history.clear().unwrap();
        history.save(IMG, record("x")).unwrap();
        history.clear().unwrap();
        assert!(history.is_empty());
        assert_eq!(mem.get(KEY).unwrap(), None);
        history.clear().unwrap();
    }

    #[test]
    fn corrupt_blob_loads_as_empty() {
        let mem = MemoryStore::new();
        mem.set(KEY, b"{not json").unwrap();
        let mut history = HistoryStore::open(mem.clone(), KEY, None);
        assert!(history.is_empty());

        // Still usable: the next save overwrites the corrupt blob.
        history.save(IMG, record("fresh")).unwrap();
        assert_eq!(HistoryStore::open(mem, KEY, None).len(), 1);
    }

    #[test]
    fn unreadable_storage_loads_as_empty_and_surfaces_write_errors() {
        let mut history = HistoryStore::open(BrokenStore, KEY, None);
        assert!(history.is_empty());
        assert!(matches!(
            history.save(IMG, record("x")),
            Err(ScanError::StorageFailed { .. })
        ));
        assert!(history.is_empty());
    }

    #[test]
    fn quota_failure_leaves_memory_and_storage_unchanged() {
        let mem = MemoryStore::with_capacity_limit(600);
        let mut history = HistoryStore::open(mem.clone(), KEY, None);
        history.save(IMG, record("small")).unwrap();
        let before = mem.get(KEY).unwrap();

        let big_image = format!("data:image/png;base64,{}", "A".repeat(2000));
        let err = history.save(big_image, record("big")).unwrap_err();
        assert!(matches!(err, ScanError::StorageQuotaExceeded { .. }));

        assert_eq!(history.len(), 1);
        assert_eq!(history.list()[0].record.name, "small");
        assert_eq!(mem.get(KEY).unwrap(), before);
    }

    #[test]
    fn load_orders_newest_first_regardless_of_blob_order() {
        let mem = MemoryStore::new();
        let blob = r#"[
            {"id":"1","timestamp":1,"imageUrl":"data:image/png;base64,QQ==","data":{"name":"old"}},
            {"id":"3","timestamp":3,"imageUrl":"data:image/png;base64,Qw==","data":{"name":"new"}},
            {"id":"2","timestamp":2,"imageUrl":"data:image/png;base64,Qg==","data":{"name":"mid"}}
        ]"#;
        mem.set(KEY, blob.as_bytes()).unwrap();
        let history = HistoryStore::open(mem, KEY, None);
        let names: Vec<_> = history.list().iter().map(|e| e.record.name.as_str()).collect();
        assert_eq!(names, ["new", "mid", "old"]);
    }

    #[test]
    fn exhausted_ids_fail_save_without_changes() {
        let mem = MemoryStore::new();
        let blob = r#"[{"id":"18446744073709551615","timestamp":1,
            "imageUrl":"data:image/png;base64,QQ==","data":{"name":"last"}}]"#;
        mem.set(KEY, blob.as_bytes()).unwrap();

        let mut history = HistoryStore::open(mem.clone(), KEY, None);
        assert_eq!(history.list()[0].id, EntryId::new(u64::MAX));

        let err = history.save(IMG, record("next")).unwrap_err();
        assert!(matches!(err, ScanError::StorageCorrupt { .. }));
        assert_eq!(history.len(), 1);
        assert_eq!(mem.get(KEY).unwrap().as_deref(), Some(blob.as_bytes()));

        // Clearing recovers.
        history.clear().unwrap();
        history.save(IMG, record("next")).unwrap();
        assert_eq!(history.len(), 1);
    }
}
