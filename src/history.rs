use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::lottery::LotteryHistoryEntry;

/// Maximum number of draws kept; older ones are dropped silently
pub const HISTORY_LIMIT: usize = 200;

/// Log of past draws, most recent first
pub trait HistoryStore {
    /// All stored entries, most recent first
    fn read(&self) -> Result<Vec<LotteryHistoryEntry>>;

    /// Replaces the whole log
    fn write(&mut self, entries: &[LotteryHistoryEntry]) -> Result<()>;

    /// Prepends `entry`, dropping anything past [`HISTORY_LIMIT`]
    fn append(&mut self, entry: LotteryHistoryEntry) -> Result<()> {
        let mut entries = self.read()?;
        entries.insert(0, entry);
        entries.truncate(HISTORY_LIMIT);
        self.write(&entries)
    }
}

/// Durable store backed by a single JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn read(&self) -> Result<Vec<LotteryHistoryEntry>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                // A damaged log reads as empty; the next append starts it over
                warn!(path = %self.path.display(), error = %e, "failed to parse lottery history");
                Ok(Vec::new())
            }
        }
    }

    fn write(&mut self, entries: &[LotteryHistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), count = entries.len(), "wrote lottery history");
        Ok(())
    }
}

/// Volatile in-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    entries: Vec<LotteryHistoryEntry>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn read(&self) -> Result<Vec<LotteryHistoryEntry>> {
        Ok(self.entries.clone())
    }

    fn write(&mut self, entries: &[LotteryHistoryEntry]) -> Result<()> {
        self.entries = entries.to_vec();
        Ok(())
    }

    fn append(&mut self, entry: LotteryHistoryEntry) -> Result<()> {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
        Ok(())
    }
}

/// File-backed store when a path is given, in-memory otherwise
pub fn open_history_store(path: Option<&Path>) -> Box<dyn HistoryStore + Send> {
    match path {
        Some(path) => Box::new(JsonFileHistoryStore::new(path)),
        None => Box::new(MemoryHistoryStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: &str, day: i64) -> LotteryHistoryEntry {
        LotteryHistoryEntry {
            id: id.to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap() + Duration::days(day),
            winners: Vec::new(),
            missed_participant_ids: vec!["x".to_string()],
        }
    }

    fn exercise_append(store: &mut dyn HistoryStore) {
        store.append(entry("first", 0)).unwrap();
        store.append(entry("second", 1)).unwrap();

        let entries = store.read().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "second");
        assert_eq!(entries[1].id, "first");
    }

    fn exercise_limit(store: &mut dyn HistoryStore) {
        for i in 0..(HISTORY_LIMIT + 5) {
            store.append(entry(&format!("draw-{i}"), i as i64)).unwrap();
        }
        let entries = store.read().unwrap();
        assert_eq!(entries.len(), HISTORY_LIMIT);
        assert_eq!(entries[0].id, format!("draw-{}", HISTORY_LIMIT + 4));
        assert_eq!(entries[HISTORY_LIMIT - 1].id, "draw-5");
    }

    #[test]
    fn memory_store_prepends() {
        exercise_append(&mut MemoryHistoryStore::new());
    }

    #[test]
    fn memory_store_is_bounded() {
        exercise_limit(&mut MemoryHistoryStore::new());
    }

    #[test]
    fn file_store_prepends_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = JsonFileHistoryStore::new(&path);
        exercise_append(&mut store);

        let reopened = JsonFileHistoryStore::new(&path);
        assert_eq!(reopened.read().unwrap()[0].id, "second");
    }

    #[test]
    fn file_store_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        exercise_limit(&mut JsonFileHistoryStore::new(dir.path().join("history.json")));
    }

    #[test]
    fn write_replaces_everything() {
        let mut store = MemoryHistoryStore::new();
        store.append(entry("old", 0)).unwrap();
        store.write(&[entry("a", 1), entry("b", 2)]).unwrap();

        let ids: Vec<String> = store.read().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_or_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonFileHistoryStore::new(&path);
        assert!(store.read().unwrap().is_empty());

        fs::write(&path, "{not json").unwrap();
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn open_picks_backend_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut durable = open_history_store(Some(path.as_path()));
        durable.append(entry("kept", 0)).unwrap();
        assert!(path.exists());

        let mut volatile = open_history_store(None);
        volatile.append(entry("gone", 0)).unwrap();
        assert_eq!(volatile.read().unwrap().len(), 1);
    }
}
