//! Schema/circuit version guard.
//!
//! Shares computed under an older circuit version must never be mixed with a
//! newer server-side circuit, so a version mismatch invalidates everything
//! the client has persisted.

use crate::store::{KeyValueStore, KEY_SCHEMA};
use anyhow::Result;

/// Circuit version this client was built against.
pub const SCHEMA_VERSION: u32 = 2;

/// Compare the persisted schema version against the compiled constant.
///
/// Runs once per process start, before any other component reads the store.
/// On absence or mismatch every persisted key is cleared and the compiled
/// version written back; returns whether a reset happened. Storage errors
/// propagate — the client cannot proceed without a usable store.
pub fn ensure_current(store: &mut impl KeyValueStore) -> Result<bool> {
    let persisted = store.get(KEY_SCHEMA).and_then(|raw| raw.parse::<u32>().ok());
    if persisted == Some(SCHEMA_VERSION) {
        return Ok(false);
    }
    store.clear()?;
    store.set(KEY_SCHEMA, &SCHEMA_VERSION.to_string())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, KEY_PROFILE, KEY_TOKEN};

    #[test]
    fn matching_version_is_a_no_op() {
        let mut store = MemoryStore::default();
        store.set(KEY_SCHEMA, &SCHEMA_VERSION.to_string()).unwrap();
        store.set(KEY_TOKEN, "abc").unwrap();

        assert!(!ensure_current(&mut store).unwrap());
        assert_eq!(store.get(KEY_TOKEN).as_deref(), Some("abc"));
    }

    #[test]
    fn mismatch_clears_every_key() {
        let mut store = MemoryStore::default();
        store.set(KEY_SCHEMA, "1").unwrap();
        store.set(KEY_PROFILE, "{}").unwrap();
        store.set(KEY_TOKEN, "abc").unwrap();

        assert!(ensure_current(&mut store).unwrap());
        assert_eq!(store.get(KEY_PROFILE), None);
        assert_eq!(store.get(KEY_TOKEN), None);
        assert_eq!(
            store.get(KEY_SCHEMA).as_deref(),
            Some(SCHEMA_VERSION.to_string().as_str())
        );
    }

    #[test]
    fn absent_or_garbage_version_counts_as_mismatch() {
        let mut store = MemoryStore::default();
        assert!(ensure_current(&mut store).unwrap());

        let mut store = MemoryStore::default();
        store.set(KEY_SCHEMA, "not-a-number").unwrap();
        store.set(KEY_TOKEN, "abc").unwrap();
        assert!(ensure_current(&mut store).unwrap());
        assert_eq!(store.get(KEY_TOKEN), None);
    }
}
