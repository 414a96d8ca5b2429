//! Durable key/value state surviving restarts.
//!
//! The workflow machine takes the store as an injected trait so tests can
//! substitute an in-memory implementation. All operations are synchronous
//! and effective immediately; `FileStore` writes through on every `set`.

use crate::model::{Profile, SessionToken, StoredProfile};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const KEY_SCHEMA: &str = "co-match-schema";
pub const KEY_PROFILE: &str = "co-match-profile";
pub const KEY_TOKEN: &str = "co-match-token";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Load the persisted profile envelope.
///
/// A malformed entry reads as absent rather than failing the caller; the
/// schema guard handles the systematic version-skew case.
pub fn load_profile(store: &impl KeyValueStore) -> Option<StoredProfile> {
    store
        .get(KEY_PROFILE)
        .and_then(|raw| serde_json::from_str(&raw).ok())
}

pub fn save_profile(store: &mut impl KeyValueStore, profile: &Profile) -> Result<StoredProfile> {
    let saved_utc = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into());
    let stored = StoredProfile {
        saved_utc,
        profile: profile.clone(),
    };
    let raw = serde_json::to_string(&stored)?;
    store.set(KEY_PROFILE, &raw)?;
    Ok(stored)
}

pub fn load_token(store: &impl KeyValueStore) -> Option<SessionToken> {
    store
        .get(KEY_TOKEN)
        .filter(|raw| !raw.is_empty())
        .map(SessionToken::new)
}

pub fn save_token(store: &mut impl KeyValueStore, token: &SessionToken) -> Result<()> {
    store.set(KEY_TOKEN, token.as_str())
}

/// JSON-backed store under the platform data directory.
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Default location: `<data_dir>/co-match/state.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_dir().context("could not determine platform data directory")?;
        Ok(base.join("co-match").join("state.json"))
    }

    /// Open the store, creating parent directories as needed. A missing or
    /// unreadable-as-JSON file opens as an empty store.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("write store file {}", self.path.display()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }
}

/// In-memory store for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MatchCriteria;
    use rand::Rng;

    fn sample_profile() -> Profile {
        Profile {
            id: "0x1fed07ad686a727dfc33b91206d526e61f519dca".into(),
            id_nullifier: 12345,
            age: 30,
            gender: 0,
            region: 1,
            interests: vec![5, 8, 10],
            preferences: MatchCriteria {
                age_min: 25,
                age_max: 35,
                gender: 1,
            },
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::default();
        assert_eq!(store.get(KEY_TOKEN), None);
        store.set(KEY_TOKEN, "abc").unwrap();
        assert_eq!(store.get(KEY_TOKEN).as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.get(KEY_TOKEN), None);
    }

    #[test]
    fn profile_round_trip_preserves_record() {
        let mut store = MemoryStore::default();
        let profile = sample_profile();
        save_profile(&mut store, &profile).unwrap();
        let stored = load_profile(&store).expect("profile persisted");
        assert_eq!(stored.profile, profile);
        assert!(!stored.saved_utc.is_empty());
    }

    #[test]
    fn malformed_profile_reads_as_absent() {
        let mut store = MemoryStore::default();
        store.set(KEY_PROFILE, "{not json").unwrap();
        assert!(load_profile(&store).is_none());
    }

    #[test]
    fn empty_token_reads_as_absent() {
        let mut store = MemoryStore::default();
        store.set(KEY_TOKEN, "").unwrap();
        assert!(load_token(&store).is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let name: u64 = rand::thread_rng().gen();
        let path = std::env::temp_dir().join(format!("co-match-test-{name}/state.json"));

        let mut store = FileStore::open(path.clone()).unwrap();
        store.set(KEY_TOKEN, "abc").unwrap();
        drop(store);

        let reopened = FileStore::open(path.clone()).unwrap();
        assert_eq!(reopened.get(KEY_TOKEN).as_deref(), Some("abc"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let name: u64 = rand::thread_rng().gen();
        let path = std::env::temp_dir().join(format!("co-match-test-{name}/state.json"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "][").unwrap();

        let store = FileStore::open(path.clone()).unwrap();
        assert_eq!(store.get(KEY_TOKEN), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
