use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

use crate::encoding::{decode, encode};
use crate::model::{VaultSettings, VaultSnapshot};

pub const ITEMS_SLOT: &str = "cb.k7.a1";
pub const CREDENTIALS_SLOT: &str = "cb.k7.b2";
pub const GATEKEEPERS_SLOT: &str = "cb.k7.c3";
pub const SETTINGS_SLOT: &str = "cb.k7.d4";

pub const ALL_SLOTS: [&str; 4] = [ITEMS_SLOT, CREDENTIALS_SLOT, GATEKEEPERS_SLOT, SETTINGS_SLOT];

/// Named text slots. A missing slot reads as `None`.
pub trait SlotBackend: Send + Sync {
    fn read(&self, slot: &str) -> Result<Option<String>>;
    fn write_all(&self, slots: &[(&str, String)]) -> Result<()>;
}

/// One file per slot under a directory. Each file is replaced atomically.
#[derive(Debug, Clone)]
pub struct FileSlots {
    dir: PathBuf,
}

impl FileSlots {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.dat"))
    }
}

impl SlotBackend for FileSlots {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(data))
    }

    fn write_all(&self, slots: &[(&str, String)]) -> Result<()> {
        // Stage every slot first so a failure leaves the old files untouched.
        let mut staged = Vec::with_capacity(slots.len());
        for (slot, data) in slots {
            let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
            tmp.write_all(data.as_bytes())?;
            tmp.flush()?;
            staged.push((tmp, self.slot_path(slot)));
        }
        // Keep the current contents so slots already replaced can be put
        // back if a later one fails; the four files change together or not
        // at all.
        let previous: Vec<Option<String>> = staged
            .iter()
            .map(|(_, dest)| {
                if dest.is_file() {
                    fs::read_to_string(dest).ok()
                } else {
                    None
                }
            })
            .collect();
        let mut replaced: Vec<(PathBuf, Option<String>)> = Vec::with_capacity(staged.len());
        for ((tmp, dest), old) in staged.into_iter().zip(previous) {
            if let Err(e) = tmp.persist(&dest) {
                rollback(&replaced);
                return Err(anyhow!("persist {}: {}", dest.display(), e.error));
            }
            replaced.push((dest, old));
        }
        Ok(())
    }
}

fn rollback(replaced: &[(PathBuf, Option<String>)]) {
    for (dest, old) in replaced.iter().rev() {
        let restored = match old {
            Some(data) => fs::write(dest, data),
            None => fs::remove_file(dest),
        };
        if let Err(err) = restored {
            error!(path = %dest.display(), error = %err, "slot rollback failed");
        }
    }
}

/// In-process slots, shared between clones. Used by tests and by hosts that
/// provide their own persistence.
#[derive(Debug, Clone, Default)]
pub struct MemorySlots {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots.read().get(slot).cloned()
    }

    pub fn put_raw(&self, slot: &str, data: &str) {
        self.slots.write().insert(slot.to_string(), data.to_string());
    }
}

impl SlotBackend for MemorySlots {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.read().get(slot).cloned())
    }

    fn write_all(&self, slots: &[(&str, String)]) -> Result<()> {
        let mut guard = self.slots.write();
        for (slot, data) in slots {
            guard.insert(slot.to_string(), data.clone());
        }
        Ok(())
    }
}

/// Durable holder of the four vault collections.
///
/// `load` and `save` never fail the caller: an undecodable slot loads as an
/// empty collection and a failed write is logged.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn SlotBackend>,
}

impl Store {
    pub fn new(backend: Arc<dyn SlotBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlots::new()))
    }

    pub fn load(&self) -> VaultSnapshot {
        VaultSnapshot {
            items: self.load_slot(ITEMS_SLOT).unwrap_or_default(),
            credentials: self.load_slot(CREDENTIALS_SLOT).unwrap_or_default(),
            gatekeepers: self.load_slot(GATEKEEPERS_SLOT).unwrap_or_default(),
            settings: self
                .load_slot::<VaultSettings>(SETTINGS_SLOT)
                .unwrap_or_default(),
        }
    }

    pub fn save(&self, snapshot: &VaultSnapshot) {
        if let Err(err) = self.try_save(snapshot) {
            error!(error = %err, "vault save failed");
        }
    }

    fn try_save(&self, snapshot: &VaultSnapshot) -> Result<()> {
        let slots = [
            (ITEMS_SLOT, encode(&snapshot.items)?),
            (CREDENTIALS_SLOT, encode(&snapshot.credentials)?),
            (GATEKEEPERS_SLOT, encode(&snapshot.gatekeepers)?),
            (SETTINGS_SLOT, encode(&snapshot.settings)?),
        ];
        self.backend.write_all(&slots)
    }

    fn load_slot<T: DeserializeOwned + Serialize>(&self, slot: &str) -> Option<T> {
        let blob = match self.backend.read(slot) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(err) => {
                warn!(slot, error = %err, "slot unreadable; treating as empty");
                return None;
            }
        };
        match decode(&blob) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(slot, error = %err, "storage corrupt; treating as empty");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapturedItem, Category, GatekeeperAccount};
    use tempfile::tempdir;

    fn sample_snapshot() -> VaultSnapshot {
        let mut snapshot = VaultSnapshot::default();
        snapshot
            .items
            .push(CapturedItem::new("hello".into(), Category::Text));
        snapshot.gatekeepers.push(GatekeeperAccount {
            id: "g1".into(),
            username: "guard".into(),
            secret_digest: "00".into(),
        });
        snapshot.settings.collector_address = "ops@example.com".into();
        snapshot
    }

    #[test]
    fn missing_slots_load_as_defaults() {
        let store = Store::in_memory();
        assert_eq!(store.load(), VaultSnapshot::default());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = Store::new(Arc::new(FileSlots::new(dir.path()).unwrap()));
        let snapshot = sample_snapshot();
        store.save(&snapshot);
        assert_eq!(store.load(), snapshot);
        for slot in ALL_SLOTS {
            assert!(dir.path().join(format!("{slot}.dat")).exists());
        }
    }

    #[test]
    fn corrupt_slot_only_empties_that_collection() {
        let slots = MemorySlots::new();
        let store = Store::new(Arc::new(slots.clone()));
        store.save(&sample_snapshot());
        slots.put_raw(ITEMS_SLOT, "%%%corrupt%%%");
        let loaded = store.load();
        assert!(loaded.items.is_empty());
        assert_eq!(loaded.gatekeepers.len(), 1);
        assert_eq!(loaded.settings.collector_address, "ops@example.com");
    }

    #[test]
    fn failed_write_leaves_earlier_slots_untouched() {
        let dir = tempdir().unwrap();
        let slots = FileSlots::new(dir.path()).unwrap();
        let store = Store::new(Arc::new(slots.clone()));
        let before = sample_snapshot();
        store.save(&before);

        // A directory where the last slot file should be makes its rename fail.
        let settings_path = dir.path().join(format!("{SETTINGS_SLOT}.dat"));
        fs::remove_file(&settings_path).unwrap();
        fs::create_dir(&settings_path).unwrap();

        let mut after = before.clone();
        after.items.clear();
        after.gatekeepers.clear();
        let blobs = [
            (ITEMS_SLOT, encode(&after.items).unwrap()),
            (CREDENTIALS_SLOT, encode(&after.credentials).unwrap()),
            (GATEKEEPERS_SLOT, encode(&after.gatekeepers).unwrap()),
            (SETTINGS_SLOT, encode(&after.settings).unwrap()),
        ];
        assert!(slots.write_all(&blobs).is_err());

        let loaded = store.load();
        assert_eq!(loaded.items, before.items);
        assert_eq!(loaded.gatekeepers, before.gatekeepers);
    }

    #[test]
    fn stored_blobs_are_not_plaintext() {
        let slots = MemorySlots::new();
        let store = Store::new(Arc::new(slots.clone()));
        store.save(&sample_snapshot());
        let raw = slots.raw(SETTINGS_SLOT).unwrap();
        assert!(!raw.contains("ops@example.com"));
    }
}
