//! Save-state persistence over a string key-value store.
//!
//! Key scheme:
//! - `gba:state:<rom>:slot:<n>` → base64 state blob
//! - `gba:meta:<rom>` → JSON `{romHash, romName, updatedAt, lastSlot}`
//!
//! Keys are namespaced by ROM identity and slot, so two ROMs or two slots of
//! the same ROM never share an entry.

#[cfg(feature = "native")]
mod file;
mod memory;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::emulator::SaveSlot;
use crate::error::StoreError;
use crate::rom::RomIdentity;

#[cfg(feature = "native")]
pub use file::FileStorage;
pub use memory::MemoryStorage;

const KEY_PREFIX: &str = "gba";

/// Minimal string key-value backend (browser `localStorage`, a directory,
/// or memory).
pub trait Storage {
    /// # Errors
    ///
    /// Backend failure; a missing key is `Ok(None)`.
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Backend failure, e.g. quota exceeded.
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Backend failure.
    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;
}

#[must_use]
pub fn state_key(rom: &RomIdentity, slot: SaveSlot) -> String {
    format!("{KEY_PREFIX}:state:{rom}:slot:{slot}")
}

#[must_use]
pub fn meta_key(rom: &RomIdentity) -> String {
    format!("{KEY_PREFIX}:meta:{rom}")
}

/// Per-ROM metadata, rewritten on every successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveMeta {
    pub rom_hash: RomIdentity,
    /// Display only; not part of any key.
    pub rom_name: String,
    /// Epoch milliseconds.
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_slot: Option<SaveSlot>,
}

/// Save-state store over any [`Storage`].
#[derive(Debug, Default)]
pub struct SaveStateStore<S> {
    storage: S,
}

impl<S: Storage> SaveStateStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write a state blob, replacing whatever the slot held.
    ///
    /// # Errors
    ///
    /// Backend write failure.
    pub fn put_save_state(
        &mut self,
        rom: &RomIdentity,
        slot: SaveSlot,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.storage
            .set_item(&state_key(rom, slot), &STANDARD.encode(bytes))
    }

    /// Read a state blob back. `Ok(None)` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Backend failure, or a stored value that is not base64.
    pub fn get_save_state(
        &self,
        rom: &RomIdentity,
        slot: SaveSlot,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        self.storage
            .get_item(&state_key(rom, slot))?
            .map(|text| STANDARD.decode(text).map_err(StoreError::from))
            .transpose()
    }

    /// Existence check without decoding.
    ///
    /// # Errors
    ///
    /// Backend failure.
    pub fn has_save_state(&self, rom: &RomIdentity, slot: SaveSlot) -> Result<bool, StoreError> {
        Ok(self.storage.get_item(&state_key(rom, slot))?.is_some())
    }

    /// # Errors
    ///
    /// Backend failure.
    pub fn delete_save_state(&mut self, rom: &RomIdentity, slot: SaveSlot) -> Result<(), StoreError> {
        self.storage.remove_item(&state_key(rom, slot))
    }

    /// # Errors
    ///
    /// Backend write failure.
    pub fn put_meta(&mut self, meta: &SaveMeta) -> Result<(), StoreError> {
        let json = serde_json::to_string(meta)?;
        self.storage.set_item(&meta_key(&meta.rom_hash), &json)
    }

    /// Read metadata. Malformed JSON reads as absent.
    ///
    /// # Errors
    ///
    /// Backend failure.
    pub fn get_meta(&self, rom: &RomIdentity) -> Result<Option<SaveMeta>, StoreError> {
        let Some(text) = self.storage.get_item(&meta_key(rom))? else {
            return Ok(None);
        };
        match serde_json::from_str(&text) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!("Ignoring malformed save metadata for {rom}: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(seed: u8) -> RomIdentity {
        RomIdentity::from_rom(&[seed; 64])
    }

    fn slot(n: u8) -> SaveSlot {
        SaveSlot::try_from(n).unwrap()
    }

    #[test]
    fn keys_follow_scheme() {
        let id = RomIdentity::from_hex("0123456789abcdef").unwrap();
        assert_eq!(state_key(&id, slot(3)), "gba:state:0123456789abcdef:slot:3");
        assert_eq!(meta_key(&id), "gba:meta:0123456789abcdef");
    }

    #[test]
    fn round_trip_every_slot_including_empty() {
        let mut store = SaveStateStore::new(MemoryStorage::default());
        let id = rom(1);
        for s in SaveSlot::ALL {
            let blob: Vec<u8> = (0..=u8::MAX).map(|b| b ^ s.get()).collect();
            store.put_save_state(&id, s, &blob).unwrap();
            assert_eq!(store.get_save_state(&id, s).unwrap(), Some(blob));
        }

        store.put_save_state(&id, slot(1), &[]).unwrap();
        assert_eq!(store.get_save_state(&id, slot(1)).unwrap(), Some(Vec::new()));
        assert!(store.has_save_state(&id, slot(1)).unwrap());
    }

    #[test]
    fn slots_and_roms_do_not_interfere() {
        let mut store = SaveStateStore::new(MemoryStorage::default());
        let (a, b) = (rom(1), rom(2));
        store.put_save_state(&a, slot(1), b"one").unwrap();
        store.put_save_state(&a, slot(2), b"two").unwrap();
        store.put_save_state(&b, slot(1), b"other").unwrap();

        assert_eq!(store.get_save_state(&a, slot(1)).unwrap().unwrap(), b"one");
        assert_eq!(store.get_save_state(&a, slot(2)).unwrap().unwrap(), b"two");
        assert_eq!(store.get_save_state(&b, slot(1)).unwrap().unwrap(), b"other");
        assert_eq!(store.get_save_state(&b, slot(2)).unwrap(), None);
        assert!(!store.has_save_state(&a, slot(3)).unwrap());
    }

    #[test]
    fn delete_empties_slot() {
        let mut store = SaveStateStore::new(MemoryStorage::default());
        let id = rom(4);
        store.put_save_state(&id, slot(2), b"x").unwrap();
        store.delete_save_state(&id, slot(2)).unwrap();
        assert_eq!(store.get_save_state(&id, slot(2)).unwrap(), None);
    }

    #[test]
    fn corrupt_blob_is_a_decode_error() {
        let mut storage = MemoryStorage::default();
        let id = rom(5);
        storage.set_item(&state_key(&id, slot(1)), "not base64!").unwrap();
        let store = SaveStateStore::new(storage);
        assert!(matches!(
            store.get_save_state(&id, slot(1)),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn meta_round_trip_uses_camel_case() {
        let mut store = SaveStateStore::new(MemoryStorage::default());
        let meta = SaveMeta {
            rom_hash: rom(6),
            rom_name: "game.gba".to_string(),
            updated_at: 1_700_000_000_000,
            last_slot: Some(slot(2)),
        };
        store.put_meta(&meta).unwrap();
        assert_eq!(store.get_meta(&meta.rom_hash).unwrap(), Some(meta.clone()));

        let raw = store
            .storage()
            .get_item(&meta_key(&meta.rom_hash))
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["lastSlot"], 2);
        assert_eq!(value["romName"], "game.gba");
        assert_eq!(value["updatedAt"], 1_700_000_000_000_u64);
    }

    #[test]
    fn malformed_meta_reads_as_absent() {
        let mut storage = MemoryStorage::default();
        let id = rom(7);
        storage.set_item(&meta_key(&id), "{not json").unwrap();
        let store = SaveStateStore::new(storage);
        assert_eq!(store.get_meta(&id).unwrap(), None);
        assert_eq!(store.get_meta(&rom(8)).unwrap(), None);
    }
}
