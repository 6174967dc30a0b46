use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use runbook_core::{replace_file, ParsedArguments};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const PARAMETERS_FILE_NAME: &str = "parameters.yaml";
pub const STATE_DIR_MODE: u32 = 0o770;

/// Last written value per binding name, shared by every task of the tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedRecord(BTreeMap<String, Value>);

impl PersistedRecord {
    /// Snapshot of everything `parsed` is allowed to persist.
    pub fn from_parsed(parsed: &ParsedArguments) -> Self {
        Self(parsed.persistable_entries())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for PersistedRecord {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self(values)
    }
}

/// Reads and wholesale-replaces the persisted record file.
///
/// There is no locking: concurrent invocations race and the last writer wins.
/// Writes go through a temp file and rename, so readers never see a torn file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceStore {
    path: PathBuf,
}

impl PersistenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by `parameters.yaml` inside `state_dir`.
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(PARAMETERS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or empty file reads as an empty record. Unparseable content is
    /// logged and treated as empty; other I/O failures are returned.
    pub fn read(&self) -> Result<PersistedRecord> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted parameters yet");
                return Ok(PersistedRecord::default());
            }
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("failed to read persisted parameters {}", self.path.display())
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(PersistedRecord::default());
        }
        match serde_yaml::from_str::<Option<PersistedRecord>>(&raw) {
            Ok(record) => {
                let record = record.unwrap_or_default();
                debug!(
                    path = %self.path.display(),
                    entries = record.len(),
                    "loaded persisted parameters"
                );
                Ok(record)
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "ignoring unreadable persisted parameters"
                );
                Ok(PersistedRecord::default())
            }
        }
    }

    /// Replaces the file with `record`, creating the state directory first.
    pub fn write(&self, record: &PersistedRecord) -> Result<()> {
        let encoded = serde_yaml::to_string(record).context("failed to encode persisted parameters")?;
        replace_file(&self.path, &encoded, STATE_DIR_MODE)?;
        debug!(
            path = %self.path.display(),
            entries = record.len(),
            "persisted parameters"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use runbook_core::ParsedArguments;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{PersistedRecord, PersistenceStore, PARAMETERS_FILE_NAME};

    #[test]
    fn unit_missing_and_empty_files_read_as_empty() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::in_state_dir(temp.path());
        assert!(store.read().expect("missing").is_empty());

        std::fs::write(store.path(), "").expect("write empty");
        assert!(store.read().expect("empty").is_empty());
        std::fs::write(store.path(), "---\n").expect("write null document");
        assert!(store.read().expect("null document").is_empty());
    }

    #[test]
    fn regression_unparseable_file_degrades_to_empty() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::in_state_dir(temp.path());
        std::fs::write(store.path(), "- not\n- a mapping\n").expect("write");
        assert!(store.read().expect("read").is_empty());
    }

    #[test]
    fn functional_write_creates_state_dir_and_reads_back() {
        let temp = tempdir().expect("tempdir");
        let state_dir = temp.path().join("nested").join("state");
        let store = PersistenceStore::in_state_dir(&state_dir);

        let mut parsed = ParsedArguments::new("setup");
        parsed.set_explicit("mode", json!("create"));
        parsed.set_explicit("plugins", json!(["a", "b"]));
        parsed.set_explicit("verbose", json!(2));
        parsed.set_default("port", json!(8443));
        store
            .write(&PersistedRecord::from_parsed(&parsed))
            .expect("write");

        assert!(state_dir.join(PARAMETERS_FILE_NAME).is_file());
        let record = store.read().expect("read");
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("mode"), Some(&json!("create")));
        assert_eq!(record.get("plugins"), Some(&json!(["a", "b"])));
        assert_eq!(record.get("port"), Some(&json!(8443)));
        assert!(!record.contains("verbose"));
    }

    #[cfg(unix)]
    #[test]
    fn functional_state_dir_is_created_with_restricted_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().expect("tempdir");
        let state_dir = temp.path().join("state");
        PersistenceStore::in_state_dir(&state_dir)
            .write(&PersistedRecord::default())
            .expect("write");
        let mode = std::fs::metadata(&state_dir)
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o007, 0);
    }

    #[test]
    fn regression_write_replaces_previous_record_wholesale() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::in_state_dir(temp.path());
        let mut first = PersistedRecord::default();
        first.insert("stale", json!(true));
        store.write(&first).expect("first write");

        let mut second = PersistedRecord::default();
        second.insert("fresh", json!(1));
        store.write(&second).expect("second write");

        assert_eq!(store.read().expect("read"), second);
    }

    #[test]
    fn regression_directory_in_place_of_record_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let store = PersistenceStore::in_state_dir(temp.path());
        std::fs::create_dir_all(store.path()).expect("create dir");
        let error = store.read().expect_err("directory must fail");
        assert!(format!("{error:#}").contains("failed to read persisted parameters"));
        assert!(store.write(&PersistedRecord::default()).is_err());
    }
}
