//! Applying committed log entries to a state machine. The core treats
//! `LogEntry::command` as opaque bytes (§4.1); this module is the one place
//! that gives those bytes meaning, grounded on the original `kvserver.py`
//! whitespace-tokenized command protocol.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Anything that can apply committed commands in order. Kept as a trait so
/// a node can be wired to a different state machine without touching the
/// controller or transport.
pub trait StateMachine {
    /// Apply one committed command, returning a human-readable result for
    /// whatever surfaced the command (the console, typically).
    fn apply(&mut self, command: &[u8]) -> String;
}

/// An in-memory key/value store driven by whitespace-tokenized commands:
/// `set <key> <value...>`, `get <key>`, `delete <key>`, `snapshot <name>`,
/// `restore <name>`. `snapshot`/`restore` name a `<name>.json` file under
/// `snapshot_dir`, matching `kvserver.py`'s `json.dumps`/`json.loads`
/// pair exactly (§4.12).
#[derive(Debug)]
pub struct KvStore {
    entries: HashMap<String, String>,
    snapshot_dir: PathBuf,
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore {
    pub fn new() -> Self {
        Self::with_snapshot_dir("snapshots")
    }

    pub fn with_snapshot_dir(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: HashMap::new(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn snapshot_path(&self, name: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{name}.json"))
    }

    fn snapshot(&self, name: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.snapshot_dir)?;
        let body = serde_json::to_string(&self.entries)?;
        fs::write(self.snapshot_path(name), body)?;
        Ok(())
    }

    fn restore(&mut self, name: &str) -> anyhow::Result<()> {
        let body = fs::read_to_string(self.snapshot_path(name))?;
        self.entries = serde_json::from_str(&body)?;
        Ok(())
    }
}

impl StateMachine for KvStore {
    fn apply(&mut self, command: &[u8]) -> String {
        let text = String::from_utf8_lossy(command);
        let mut tokens = text.split_whitespace();
        match tokens.next() {
            Some("set") => {
                let Some(key) = tokens.next() else {
                    return "ERR missing key".to_string();
                };
                let value = tokens.collect::<Vec<_>>().join(" ");
                self.entries.insert(key.to_string(), value);
                "OK".to_string()
            }
            Some("get") => match tokens.next() {
                Some(key) => self.get(key).map(str::to_string).unwrap_or_else(|| "NOT_FOUND".to_string()),
                None => "ERR missing key".to_string(),
            },
            Some("delete") => match tokens.next() {
                Some(key) => {
                    let existed = self.entries.remove(key).is_some();
                    if existed { "OK".to_string() } else { "NOT_FOUND".to_string() }
                }
                None => "ERR missing key".to_string(),
            },
            Some("snapshot") => match tokens.next() {
                Some(name) => match self.snapshot(name) {
                    Ok(()) => "OK".to_string(),
                    Err(err) => format!("ERR error saving snapshot: {err}"),
                },
                None => "ERR snapshot requires a name".to_string(),
            },
            Some("restore") => match tokens.next() {
                Some(name) => match self.restore(name) {
                    Ok(()) => "OK".to_string(),
                    Err(err) => format!("ERR error restoring from snapshot: {err}"),
                },
                None => "ERR restore requires a name".to_string(),
            },
            Some(other) => format!("ERR unknown command {other}"),
            None => "ERR empty command".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> KvStore {
        KvStore::with_snapshot_dir(dir)
    }

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert_eq!(store.apply(b"set x 1"), "OK");
        assert_eq!(store.apply(b"get x"), "1");
    }

    #[test]
    fn get_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert_eq!(store.apply(b"get missing"), "NOT_FOUND");
    }

    #[test]
    fn delete_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.apply(b"set x 1");
        assert_eq!(store.apply(b"delete x"), "OK");
        assert_eq!(store.apply(b"get x"), "NOT_FOUND");
        assert_eq!(store.apply(b"delete x"), "NOT_FOUND");
    }

    #[test]
    fn snapshot_and_restore_round_trip_through_a_named_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.apply(b"set a 1");
        store.apply(b"set b 2");
        assert_eq!(store.apply(b"snapshot backup"), "OK");

        assert!(dir.path().join("backup.json").exists());

        let mut restored = store_in(dir.path());
        assert_eq!(restored.apply(b"restore backup"), "OK");
        assert_eq!(restored.get("a"), Some("1"));
        assert_eq!(restored.get("b"), Some("2"));
    }

    #[test]
    fn restore_of_missing_snapshot_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert!(store.apply(b"restore nonexistent").starts_with("ERR"));
    }

    #[test]
    fn values_may_contain_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.apply(b"set greeting hello there world");
        assert_eq!(store.get("greeting"), Some("hello there world"));
    }
}
