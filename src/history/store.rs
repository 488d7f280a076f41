use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::history::History;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed writing history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed encoding history: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable home of the announced-record log.
pub trait HistoryStore: Send + Sync {
    /// Never fails: a missing or unreadable log yields an empty history.
    fn load(&self) -> History;

    /// Replaces the stored log with `history` in one step.
    fn save(&self, history: &History) -> Result<(), HistoryError>;
}

/// `{ "rows": [[...], ...] }` on disk, rewritten in full on every save.
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl HistoryStore for JsonHistoryStore {
    fn load(&self) -> History {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no history file yet, starting empty");
            return History::default();
        }
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "history file unreadable, starting empty");
                return History::default();
            }
        };
        match serde_json::from_str::<History>(&data) {
            Ok(history) => {
                debug!(path = %self.path.display(), rows = history.len(), "loaded history");
                history
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "history file corrupt, starting empty");
                History::default()
            }
        }
    }

    fn save(&self, history: &History) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let data = encode_history(history)?;

        let tmp = self.path.with_extension("json.tmp");
        let written = write_synced(&tmp, &data).and_then(|()| fs::rename(&tmp, &self.path));
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                debug!(path = %tmp.display(), error = %cleanup, "temporary history file not removed");
            }
            return Err(self.io_error(err));
        }

        info!(path = %self.path.display(), rows = history.len(), "history saved");
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn encode_history(history: &History) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    history.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UsageRecord;

    fn record(year: &str, month: &str) -> UsageRecord {
        [year, month, "1000", "10"].into_iter().collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JsonHistoryStore::new(tmp.path().join("missing.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("log.json");
        fs::write(&path, "{ not json").expect("write corrupt file");
        let store = JsonHistoryStore::new(path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_keeps_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JsonHistoryStore::new(tmp.path().join("nested/dir/log.json"));
        let history = History::new(vec![record("2024", "02"), record("2024", "01")]);

        store.save(&history).expect("save history");
        let loaded = store.load();
        assert_eq!(loaded, history);
        assert!(!tmp.path().join("nested/dir/log.json.tmp").exists());
    }

    #[test]
    fn file_layout_is_rows_object_with_four_space_indent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("log.json");
        let store = JsonHistoryStore::new(&path);
        store
            .save(&History::new(vec![["২০২৪", "01"].into_iter().collect()]))
            .expect("save history");

        let text = fs::read_to_string(&path).expect("read history");
        assert!(text.starts_with("{\n    \"rows\": ["));
        assert!(text.contains("২০২৪"));
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["rows"][0][1], "01");
    }

    #[test]
    fn save_overwrites_previous_content() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JsonHistoryStore::new(tmp.path().join("log.json"));
        store
            .save(&History::new(vec![record("2023", "12")]))
            .expect("first save");
        store
            .save(&History::new(vec![record("2023", "12"), record("2024", "01")]))
            .expect("second save");
        assert_eq!(store.load().len(), 2);
    }

    #[test]
    fn save_into_unwritable_location_reports_io_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "file, not a directory").expect("write blocker");
        let store = JsonHistoryStore::new(blocker.join("log.json"));
        let err = store.save(&History::default()).expect_err("save must fail");
        assert!(matches!(err, HistoryError::Io { .. }));
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("log.json");
        fs::create_dir(&path).expect("directory squatting on the history path");
        fs::write(path.join("keep"), "x").expect("populate directory");

        let store = JsonHistoryStore::new(&path);
        let err = store
            .save(&History::new(vec![record("2024", "01")]))
            .expect_err("rename over a directory must fail");
        assert!(matches!(err, HistoryError::Io { .. }));
        assert!(!tmp.path().join("log.json.tmp").exists());
    }
}
