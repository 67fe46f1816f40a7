//! Key-value persistence for the three state groups.
//!
//! Each group is stored as a versioned JSON envelope
//! `{"version": n, "data": ...}` under its own key, so one unreadable group
//! never takes the others down with it.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PET_STATE_KEY: &str = "pet-state";
pub const STATISTICS_KEY: &str = "pet-statistics";
pub const ACHIEVEMENTS_KEY: &str = "pet-achievements";

/// Current envelope version. Version 0 is a bare, unwrapped payload.
pub const SCHEMA_VERSION: u32 = 1;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        (**self).set(key, value)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        fs::read_to_string(path).ok()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key)?;
        write_atomic(&path, value.as_bytes())
    }
}

/// Writes through a sibling temp file and renames it over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    if let Err(err) = fs::rename(&tmp, path) {
        // some platforms refuse to rename over an existing file
        if !path.exists() {
            return Err(err.into());
        }
        fs::remove_file(path)?;
        fs::rename(&tmp, path)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: serde_json::Value,
}

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: SCHEMA_VERSION,
        data: value,
    })?)
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let is_envelope = value
        .as_object()
        .map_or(false, |o| o.len() == 2 && o.contains_key("version") && o.contains_key("data"));
    if !is_envelope {
        return migrate(0, value);
    }
    let envelope: Envelope = serde_json::from_value(value)?;
    migrate(envelope.version, envelope.data)
}

fn migrate<T: DeserializeOwned>(version: u32, data: serde_json::Value) -> Result<T> {
    match version {
        // v0 payloads share v1's shape; they only lacked the envelope.
        0 | 1 => Ok(serde_json::from_value(data)?),
        found => Err(StoreError::UnsupportedVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
    }
}

pub fn save_group<S, T>(store: &mut S, key: &str, value: &T) -> Result<()>
where
    S: KeyValueStore + ?Sized,
    T: Serialize,
{
    let raw = encode(value)?;
    store.set(key, raw)?;
    debug!(key, "saved group");
    Ok(())
}

/// Loads one group. Missing and unreadable groups both come back as `None`;
/// the latter is logged.
pub fn load_group<S, T>(store: &S, key: &str) -> Option<T>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    let raw = store.get(key)?;
    match decode(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "discarding unreadable saved group");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        level: u32,
    }

    fn sample() -> Sample {
        Sample {
            name: "mochi".to_string(),
            level: 3,
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "pet-companion-{tag}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn test_envelope_carries_version() {
        let raw = encode(&sample()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["version"], 1);
        assert_eq!(v["data"]["name"], "mochi");
    }

    #[test]
    fn test_decode_legacy_unwrapped_payload() {
        let got: Sample = decode(r#"{"name":"mochi","level":3}"#).unwrap();
        assert_eq!(got, sample());
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let err = decode::<Sample>(r#"{"version":9,"data":{"name":"x","level":1}}"#).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn test_load_group_missing_and_corrupt() {
        let mut store = MemoryStore::new();
        assert_eq!(load_group::<_, Sample>(&store, "a"), None);
        store.set("a", "{not json".to_string()).unwrap();
        assert_eq!(load_group::<_, Sample>(&store, "a"), None);
        store.set("a", r#"{"version":1,"data":{"wrong":true}}"#.to_string()).unwrap();
        assert_eq!(load_group::<_, Sample>(&store, "a"), None);
    }

    #[test]
    fn test_memory_store_group_roundtrip() {
        let mut store = MemoryStore::new();
        save_group(&mut store, "a", &sample()).unwrap();
        assert_eq!(load_group::<_, Sample>(&store, "a"), Some(sample()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_file_store_roundtrip_and_overwrite() {
        let dir = temp_dir("roundtrip");
        let mut store = FileStore::open(&dir).unwrap();
        save_group(&mut store, PET_STATE_KEY, &sample()).unwrap();
        let updated = Sample {
            name: "mochi".to_string(),
            level: 4,
        };
        save_group(&mut store, PET_STATE_KEY, &updated).unwrap();
        assert_eq!(load_group::<_, Sample>(&store, PET_STATE_KEY), Some(updated));
        assert!(dir.join("pet-state.json").exists());
        assert!(!dir.join("pet-state.json.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = temp_dir("failed-write");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        write_atomic(&path, b"old").unwrap();
        // a directory squatting on the temp name makes the temp write fail
        fs::create_dir_all(dir.join("settings.json.tmp")).unwrap();
        assert!(matches!(write_atomic(&path, b"new"), Err(StoreError::Io(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = temp_dir("keys");
        let mut store = FileStore::open(&dir).unwrap();
        assert!(matches!(
            store.set("../escape", "x".to_string()),
            Err(StoreError::InvalidKey(_))
        ));
        assert_eq!(store.get("../escape"), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
