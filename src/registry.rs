//! Registry of named command frames.
//!
//! Commands are keyed by the canonical hex of their payload, so saving the same payload twice
//! under different names keeps a single entry carrying the latest name. Every mutation is handed
//! to a [`CommandStore`]. Saving is best-effort: a failed save is logged by the store and the
//! in-memory registry keeps the change.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{crc, error::Result, transcode};

/// A command as persisted, keyed by its canonical payload hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommand {
    pub name: String,
    /// Payload and checksum in canonical hex.
    pub command: String,
}

/// The mapping held by the registry and handed to its store.
pub type CommandMap = BTreeMap<String, StoredCommand>;

/// A registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCommand {
    /// Canonical hex of the payload, without checksum.
    pub key: String,
    pub name: String,
    /// `key` followed by its checksum, in canonical hex.
    pub command: String,
}

impl NamedCommand {
    fn new(key: &str, stored: &StoredCommand) -> Self {
        Self {
            key: key.to_owned(),
            name: stored.name.clone(),
            command: stored.command.clone(),
        }
    }

    /// Identifier for the entry that is safe to embed in a URL.
    pub fn external_id(&self) -> String {
        transcode::encode_external_id(&self.key)
    }
}

/// Persistence for the registry.
pub trait CommandStore {
    /// Load the saved mapping. Missing or unreadable data gives an empty mapping.
    fn load(&self) -> CommandMap;

    /// Save the whole mapping, logging rather than returning any failure.
    fn save(&self, commands: &CommandMap);
}

/// Stores the registry as a pretty printed JSON object in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn try_load(&self) -> Result<CommandMap> {
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn try_save(&self, commands: &CommandMap) -> Result<()> {
        let json = serde_json::to_string_pretty(commands)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl CommandStore for JsonFileStore {
    fn load(&self) -> CommandMap {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved commands, starting empty");
            return CommandMap::new();
        }
        match self.try_load() {
            Ok(commands) => {
                info!(path = %self.path.display(), count = commands.len(), "Loaded saved commands");
                commands
            }
            Err(err) => {
                warn!(path = %self.path.display(), "Failed to load saved commands: {}", err);
                CommandMap::new()
            }
        }
    }

    fn save(&self, commands: &CommandMap) {
        match self.try_save(commands) {
            Ok(()) => debug!(path = %self.path.display(), count = commands.len(), "Saved commands"),
            Err(err) => error!(path = %self.path.display(), "Failed to save commands: {}", err),
        }
    }
}

/// Named command frames, keyed by payload.
pub struct CommandRegistry<S: CommandStore> {
    store: S,
    commands: CommandMap,
}

impl<S: CommandStore> CommandRegistry<S> {
    /// Create a registry holding whatever `store` has saved.
    pub fn open(store: S) -> Self {
        let commands = store.load();
        Self { store, commands }
    }

    /// Save `raw_hex` under `name`.
    ///
    /// If the payload is already registered only its name changes.
    pub fn upsert(&mut self, name: &str, raw_hex: &str) -> Result<NamedCommand> {
        let payload = transcode::parse_hex(raw_hex)?;
        let key = transcode::format_hex(&payload);

        let stored = self
            .commands
            .entry(key.clone())
            .and_modify(|stored| stored.name = name.to_owned())
            .or_insert_with(|| StoredCommand {
                name: name.to_owned(),
                command: transcode::format_hex(&crc::append_checksum(&payload)),
            });
        let named = NamedCommand::new(&key, stored);
        debug!(key = %named.key, name = %named.name, "Upserted command");

        self.store.save(&self.commands);
        Ok(named)
    }

    /// All entries, ordered by key.
    pub fn list(&self) -> Vec<NamedCommand> {
        self.commands
            .iter()
            .map(|(key, stored)| NamedCommand::new(key, stored))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<NamedCommand> {
        let key = canonical_key(key)?;
        self.commands
            .get(&key)
            .map(|stored| NamedCommand::new(&key, stored))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Rename the entry under `key`. Returns `false` if there is none.
    pub fn rename(&mut self, key: &str, new_name: &str) -> bool {
        let Some(key) = canonical_key(key) else {
            return false;
        };
        let Some(stored) = self.commands.get_mut(&key) else {
            return false;
        };
        stored.name = new_name.to_owned();
        self.store.save(&self.commands);
        true
    }

    /// Replace the entry under `old_key` with `new_raw_hex` named `new_name`.
    ///
    /// The old entry is removed when the payload changes.
    pub fn replace(&mut self, old_key: &str, new_name: &str, new_raw_hex: &str) -> Result<NamedCommand> {
        let new_key = transcode::normalize_hex(new_raw_hex)?;
        if let Some(old_key) = canonical_key(old_key).filter(|old_key| *old_key != new_key) {
            if self.commands.remove(&old_key).is_some() {
                debug!(from = %old_key, to = %new_key, "Moving command");
            }
        }
        self.upsert(new_name, &new_key)
    }

    /// Remove the entry under `key`. Returns `false` if there is none.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = canonical_key(key).and_then(|key| self.commands.remove(&key));
        if removed.is_none() {
            return false;
        }
        self.store.save(&self.commands);
        true
    }

    /// Decode an external id back into a registry key.
    pub fn key_from_external_id(&self, id: &str) -> Result<String> {
        transcode::decode_external_id(id)
    }

    /// Save a final time and hand back the store.
    pub fn shutdown(self) -> S {
        self.store.save(&self.commands);
        self.store
    }
}

/// Keys that are not valid hex cannot be registered, so they simply match nothing.
fn canonical_key(key: &str) -> Option<String> {
    transcode::normalize_hex(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::{cell::RefCell, rc::Rc};

    /// Keeps every saved mapping so tests can check what was persisted.
    #[derive(Default, Clone)]
    struct RecordingStore {
        initial: CommandMap,
        saves: Rc<RefCell<Vec<CommandMap>>>,
    }

    impl RecordingStore {
        fn save_count(&self) -> usize {
            self.saves.borrow().len()
        }

        fn last_saved(&self) -> CommandMap {
            self.saves.borrow().last().cloned().unwrap_or_default()
        }
    }

    impl CommandStore for RecordingStore {
        fn load(&self) -> CommandMap {
            self.initial.clone()
        }

        fn save(&self, commands: &CommandMap) {
            self.saves.borrow_mut().push(commands.clone());
        }
    }

    fn registry() -> (CommandRegistry<RecordingStore>, RecordingStore) {
        let store = RecordingStore::default();
        (CommandRegistry::open(store.clone()), store)
    }

    #[test]
    fn test_upsert_appends_checksum() {
        let (mut registry, store) = registry();
        let named = registry.upsert("Restart", "010600860640").unwrap();
        assert_eq!(named.key, "01 06 00 86 06 40");
        assert_eq!(named.name, "Restart");
        assert_eq!(named.command, "01 06 00 86 06 40 6A 73");

        let named = registry.upsert("Partial", "01 06 00 86").unwrap();
        assert_eq!(named.command, "01 06 00 86 60 7B");
        assert_eq!(registry.len(), 2);
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_upsert_same_payload_keeps_one_entry() {
        let (mut registry, _) = registry();
        registry.upsert("A", "01 06 00 86").unwrap();
        registry.upsert("B", "01 06 00 86").unwrap();

        let commands = registry.list();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "B");
        assert_eq!(commands[0].command, "01 06 00 86 60 7B");
    }

    #[test]
    fn test_upsert_rejects_invalid_hex() {
        let (mut registry, store) = registry();
        assert!(matches!(registry.upsert("Bad", "01 0"), Err(Error::InvalidHex(_))));
        assert!(matches!(registry.upsert("Bad", "zz"), Err(Error::InvalidHex(_))));
        assert!(registry.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_rename() {
        let (mut registry, store) = registry();
        registry.upsert("A", "01 06 00 86").unwrap();

        // Caller keys are normalised before lookup.
        assert!(registry.rename("01060086", "Renamed"));
        assert_eq!(registry.get("01 06 00 86").unwrap().name, "Renamed");
        assert_eq!(store.last_saved()["01 06 00 86"].name, "Renamed");

        assert!(!registry.rename("01 06 00 87", "Missing"));
        assert!(!registry.rename("not hex", "Missing"));
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_replace_moves_entry() {
        let (mut registry, store) = registry();
        let first = registry.upsert("A", "01 06 00 86").unwrap();

        let moved = registry.replace(&first.key, "C", "01 06 00 87").unwrap();
        assert_eq!(moved.key, "01 06 00 87");
        assert_eq!(moved.command, "01 06 00 87 A1 BB");

        let commands = registry.list();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].key, "01 06 00 87");
        assert_eq!(commands[0].name, "C");
        assert!(registry.get(&first.key).is_none());
        assert!(!store.last_saved().contains_key("01 06 00 86"));
    }

    #[test]
    fn test_replace_same_payload_renames() {
        let (mut registry, _) = registry();
        registry.upsert("A", "01 06 00 86").unwrap();
        registry.replace("01 06 00 86", "B", "0106 0086").unwrap();

        let commands = registry.list();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "B");
    }

    #[test]
    fn test_replace_with_invalid_hex_keeps_old_entry() {
        let (mut registry, _) = registry();
        registry.upsert("A", "01 06 00 86").unwrap();
        assert!(registry.replace("01 06 00 86", "B", "01 0").is_err());
        assert_eq!(registry.get("01 06 00 86").unwrap().name, "A");
    }

    #[test]
    fn test_delete() {
        let (mut registry, store) = registry();
        registry.upsert("A", "01 06 00 86").unwrap();

        assert!(!registry.delete("01 06 00 87"));
        assert_eq!(store.save_count(), 1);

        assert!(registry.delete("01 06 00 86"));
        assert!(registry.is_empty());
        assert!(store.last_saved().is_empty());

        assert!(!registry.delete("01 06 00 86"));
    }

    #[test]
    fn test_external_id() {
        let (mut registry, _) = registry();
        let named = registry.upsert("A", "01 06 00 86").unwrap();
        let id = named.external_id();
        assert_eq!(id, "MDEgMDYgMDAgODY");
        assert_eq!(registry.key_from_external_id(&id).unwrap(), named.key);
    }

    #[test]
    fn test_open_with_saved_commands() {
        let mut initial = CommandMap::new();
        initial.insert(
            "01 06 00 86".into(),
            StoredCommand {
                name: "Saved".into(),
                command: "01 06 00 86 60 7B".into(),
            },
        );
        let store = RecordingStore {
            initial,
            ..Default::default()
        };
        let registry = CommandRegistry::open(store);
        assert_eq!(registry.get("01 06 00 86").unwrap().name, "Saved");

        let store = registry.shutdown();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last_saved().len(), 1);
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("commands.json");

        let mut registry = CommandRegistry::open(JsonFileStore::new(&path));
        assert!(registry.is_empty());
        registry.upsert("Restart", "01 06 00 86 06 40").unwrap();
        registry.upsert("Relay", "01 03 00 80 00 01").unwrap();
        let store = registry.shutdown();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(saved["01 06 00 86 06 40"]["name"], "Restart");
        assert_eq!(saved["01 03 00 80 00 01"]["command"], "01 03 00 80 00 01 85 E2");

        let registry = CommandRegistry::open(JsonFileStore::new(&path));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("01 06 00 86 06 40").unwrap().command, "01 06 00 86 06 40 6A 73");
    }

    #[test]
    fn test_json_store_corrupt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("commands.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.try_load(), Err(Error::Json(_))));
        assert!(CommandRegistry::open(store).is_empty());
    }

    #[test]
    fn test_json_store_failed_save_keeps_change() {
        let dir = tempfile::TempDir::new().unwrap();
        // Writing to a directory fails.
        let mut registry = CommandRegistry::open(JsonFileStore::new(dir.path()));
        registry.upsert("A", "01 06 00 86").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.shutdown().try_save(&CommandMap::new()),
            Err(Error::Io(_))
        ));
    }
}
