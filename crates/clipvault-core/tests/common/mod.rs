#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clipvault_core::classifier::{ImageInput, RemoteVerdict};
use clipvault_core::storage::MemorySlots;
use clipvault_core::{
    Category, Classifier, ClassifierOracle, DisplayLanguage, MirrorPayload, MirrorTransport,
    SettingsUpdate, Store, SyncMirror, Tier, Vault,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const MASTER: &str = "abcd";
pub const COLLECTOR: &str = "collector@example.com";
pub const IDENTIFIER: &str = "owner-7731";

/// Oracle double: answers from a script, or fails when told to.
#[derive(Default)]
pub struct ScriptedOracle {
    pub fail: bool,
    pub remote_category: Option<Category>,
    pub extracted_text: String,
    pub calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn answering() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_category(category: Category) -> Self {
        Self {
            remote_category: Some(category),
            ..Self::default()
        }
    }

    pub fn extracting(text: &str) -> Self {
        Self {
            extracted_text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassifierOracle for ScriptedOracle {
    async fn classify(
        &self,
        content: &str,
        tier: Tier,
        _language: DisplayLanguage,
    ) -> Result<RemoteVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("oracle unavailable"));
        }
        Ok(RemoteVerdict {
            category: self.remote_category,
            annotation: format!("{tier:?} note on {} chars", content.chars().count()),
            safety_flag: Some(true),
        })
    }

    async fn extract_text(&self, _image: &ImageInput) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("oracle unavailable"));
        }
        Ok(self.extracted_text.clone())
    }

    async fn translate(&self, text: &str, _tier: Tier, target: DisplayLanguage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("oracle unavailable"));
        }
        Ok(format!("{}: {text}", target.name()))
    }
}

/// Mirror transport double that keeps every payload.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<MirrorPayload>>,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<MirrorPayload> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl MirrorTransport for RecordingTransport {
    async fn send(&self, payload: &MirrorPayload) -> Result<()> {
        self.sent.lock().push(payload.clone());
        Ok(())
    }
}

pub struct Fixture {
    pub vault: Arc<Vault>,
    pub slots: MemorySlots,
    pub oracle: Arc<ScriptedOracle>,
    pub transport: Arc<RecordingTransport>,
}

impl Fixture {
    pub fn new(oracle: ScriptedOracle) -> Self {
        let slots = MemorySlots::new();
        let oracle = Arc::new(oracle);
        let transport = Arc::new(RecordingTransport::default());
        let vault = build(&slots, oracle.clone(), transport.clone());
        Self {
            vault: Arc::new(vault),
            slots,
            oracle,
            transport,
        }
    }

    /// A second vault instance over the same slots, as after a restart.
    pub fn reopen(&self) -> Vault {
        build(&self.slots, self.oracle.clone(), self.transport.clone())
    }

    /// Master password set, collector configured, left locked.
    pub fn provisioned(oracle: ScriptedOracle) -> Self {
        let fx = Self::new(oracle);
        fx.vault
            .setup_master_password(MASTER, Some(IDENTIFIER))
            .expect("setup");
        fx.vault
            .update_settings(SettingsUpdate {
                collector_address: Some(COLLECTOR.to_string()),
                ..SettingsUpdate::default()
            })
            .expect("settings");
        fx.vault.lock();
        fx
    }

    pub async fn mirrored(&self) -> Vec<MirrorPayload> {
        self.vault.mirror().flush().await;
        self.transport.payloads()
    }
}

fn build(
    slots: &MemorySlots,
    oracle: Arc<ScriptedOracle>,
    transport: Arc<RecordingTransport>,
) -> Vault {
    let store = Store::new(Arc::new(slots.clone()));
    let classifier = Classifier::new(oracle, DisplayLanguage::English);
    let mirror = Arc::new(SyncMirror::new(transport));
    Vault::open(store, classifier, mirror)
}
