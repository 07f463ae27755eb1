//! The vault facade: owns the store, the access gate, the classifier and the
//! sync mirror, and runs every user-facing operation against them.
//!
//! Each mutation loads the current snapshot, changes it and saves it whole.
//! Two mutations that are not awaited in sequence race and the later save
//! wins.

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::access::{AccessController, AccessState, ViewContext};
use crate::classifier::{Classifier, ClassifierOracle, HttpOracle, ImageInput, Tier};
use crate::config::{DisplayLanguage, VaultConfig};
use crate::crypto::{secret_digest, MIN_MASTER_PASSWORD_LEN};
use crate::error::{VaultError, VaultResult};
use crate::export::{credentials_csv, BackupDocument};
use crate::mirror::{HttpRelay, MirrorReason, SyncMirror};
use crate::model::{
    group_by_application, new_id, CapturedItem, Category, CredentialRecord, GatekeeperAccount,
    NewCredential, VaultSettings, VaultSnapshot,
};
use crate::paths::slots_dir;
use crate::storage::{FileSlots, Store};

/// Platform clipboard capability. Implementations report a refused read as
/// [`VaultError::PermissionDenied`].
pub trait ClipboardSource: Send + Sync {
    fn read_text(&self) -> VaultResult<String>;
}

/// Fields a settings update may change. The view secret is not among them.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub collector_address: Option<String>,
    pub verification_identifier: Option<String>,
    pub accent_color: Option<String>,
}

pub struct Vault {
    store: Store,
    classifier: Classifier,
    mirror: Arc<SyncMirror>,
    access: Mutex<AccessController>,
}

impl Vault {
    /// Opens a vault over `store`. Access always starts `Locked`.
    pub fn open(store: Store, classifier: Classifier, mirror: Arc<SyncMirror>) -> Self {
        Self {
            store,
            classifier,
            mirror,
            access: Mutex::new(AccessController::new()),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        let slots = FileSlots::new(slots_dir(&config.data_dir))?;
        let store = Store::new(Arc::new(slots));
        let oracle: Arc<dyn ClassifierOracle> = Arc::new(HttpOracle::new(config.oracle.clone())?);
        let classifier = Classifier::new(oracle, config.language);
        let mirror = match &config.mirror.relay_url {
            Some(url) => SyncMirror::new(Arc::new(HttpRelay::new(url.clone())?)),
            None => SyncMirror::disabled(),
        };
        Ok(Self::open(store, classifier, Arc::new(mirror)))
    }

    pub fn access_state(&self) -> AccessState {
        self.access.lock().state()
    }

    pub fn mirror(&self) -> &Arc<SyncMirror> {
        &self.mirror
    }

    pub fn language(&self) -> DisplayLanguage {
        self.classifier.language()
    }

    // ── Master password ────────────────────────────────────────────────

    /// True until a master password has been set.
    pub fn needs_setup(&self) -> bool {
        !self.store.load().settings.has_master_password()
    }

    pub fn setup_master_password(
        &self,
        password: &str,
        verification_identifier: Option<&str>,
    ) -> VaultResult<()> {
        let mut access = self.access.lock();
        let mut snapshot = self.store.load();
        if snapshot.settings.has_master_password() {
            return Err(VaultError::invalid("master password already set"));
        }
        check_password_strength(password)?;
        snapshot.settings.view_secret_digest = secret_digest(password);
        if let Some(identifier) = verification_identifier {
            snapshot.settings.verification_identifier = identifier.trim().to_string();
        }
        self.store.save(&snapshot);
        access.unlock_after_setup();
        info!("master password set up");
        Ok(())
    }

    pub fn unlock(&self, password: &str) -> VaultResult<()> {
        let settings = self.store.load().settings;
        self.access.lock().unlock_view(password, &settings)
    }

    pub fn lock(&self) {
        self.access.lock().lock();
    }

    /// Host notification that the active view changed.
    pub fn context_changed(&self, to: ViewContext) {
        self.access.lock().context_changed(to);
    }

    /// Replaces the master password after checking the verification
    /// identifier. Possession of the current password is not checked.
    pub fn rotate_master_password(
        &self,
        verification_identifier: &str,
        new_password: &str,
    ) -> VaultResult<()> {
        let mut access = self.access.lock();
        let mut snapshot = self.store.load();
        let expected = snapshot.settings.verification_identifier.trim();
        let presented = verification_identifier.trim();
        // Plain equality, plus one deviation: an empty identifier never
        // matches, so a vault without one cannot be rotated by anyone.
        if presented.is_empty() || presented != expected {
            info!("password rotation rejected");
            return Err(VaultError::AuthFailed);
        }
        check_password_strength(new_password)?;
        snapshot.settings.view_secret_digest = secret_digest(new_password);
        self.store.save(&snapshot);
        access.lock();
        info!("master password rotated");
        self.mirror.mirror(MirrorReason::PasswordRotated, &snapshot);
        Ok(())
    }

    // ── Settings ───────────────────────────────────────────────────────

    pub fn settings(&self) -> VaultResult<VaultSettings> {
        self.access.lock().require_view()?;
        Ok(self.store.load().settings)
    }

    pub fn update_settings(&self, update: SettingsUpdate) -> VaultResult<VaultSettings> {
        let access = self.access.lock();
        access.require_view()?;
        if let Some(color) = &update.accent_color {
            validate_color(color)?;
        }
        let mut snapshot = self.store.load();
        let settings = &mut snapshot.settings;
        if let Some(addr) = update.collector_address {
            settings.collector_address = addr.trim().to_string();
        }
        if let Some(identifier) = update.verification_identifier {
            settings.verification_identifier = identifier.trim().to_string();
        }
        if let Some(color) = update.accent_color {
            settings.accent_color = color.to_ascii_lowercase();
        }
        self.store.save(&snapshot);
        drop(access);
        info!("settings updated");
        Ok(snapshot.settings)
    }

    // ── Captures ───────────────────────────────────────────────────────

    /// Captured items, newest first.
    pub fn items(&self) -> Vec<CapturedItem> {
        self.store.load().items
    }

    pub fn search(&self, query: &str) -> Vec<CapturedItem> {
        let query = query.trim();
        let items = self.store.load().items;
        if query.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| item.matches_query(query))
            .collect()
    }

    /// Dedupe, classify, persist, mirror. Nothing is stored unless every
    /// step succeeds.
    pub async fn capture(&self, content: &str, tier: Tier) -> VaultResult<CapturedItem> {
        if content.trim().is_empty() {
            return Err(VaultError::EmptyInput);
        }
        self.ensure_not_captured(content)?;
        let classification = self.classifier.classify(content, tier).await?;
        let mut item = CapturedItem::new(content.to_string(), classification.category);
        item.annotation = Some(classification.annotation);
        item.safety_flag = classification.safety_flag;
        self.insert_item(item)
    }

    pub async fn capture_from(
        &self,
        source: &dyn ClipboardSource,
        tier: Tier,
    ) -> VaultResult<CapturedItem> {
        let text = source.read_text()?;
        self.capture(&text, tier).await
    }

    /// Extracts text from a local image and stores it as an `image` item.
    pub async fn capture_image(&self, path: &Path) -> VaultResult<CapturedItem> {
        let bytes = tokio::fs::read(path).await.map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied => {
                VaultError::PermissionDenied(format!("cannot read {}", path.display()))
            }
            ErrorKind::NotFound => VaultError::NotFound(path.display().to_string()),
            _ => VaultError::Storage(err.to_string()),
        })?;
        let image = ImageInput::from_path_bytes(path, bytes);
        let text = self.classifier.extract_text(&image).await?;
        if text.trim().is_empty() {
            return Err(VaultError::EmptyInput);
        }
        self.ensure_not_captured(&text)?;
        let mut item = CapturedItem::new(text, Category::Image);
        item.annotation = Some(extraction_note(self.language()).to_string());
        self.insert_item(item)
    }

    /// Runs a capture to completion on the runtime even if the returned
    /// handle is dropped.
    pub fn spawn_capture(
        self: &Arc<Self>,
        content: String,
        tier: Tier,
    ) -> JoinHandle<VaultResult<CapturedItem>> {
        let vault = Arc::clone(self);
        tokio::spawn(async move { vault.capture(&content, tier).await })
    }

    pub async fn translate_item(&self, id: &str, tier: Tier) -> VaultResult<CapturedItem> {
        let content = self.find_item(id)?.content;
        let translation = self.classifier.translate(&content, tier).await?;
        self.update_item(id, |item| item.translation = Some(translation))
    }

    pub fn spawn_translate(
        self: &Arc<Self>,
        id: String,
        tier: Tier,
    ) -> JoinHandle<VaultResult<CapturedItem>> {
        let vault = Arc::clone(self);
        tokio::spawn(async move { vault.translate_item(&id, tier).await })
    }

    /// Re-runs classification and replaces the annotation and safety flag.
    /// The category stays as captured.
    pub async fn reclassify_item(&self, id: &str, tier: Tier) -> VaultResult<CapturedItem> {
        let content = self.find_item(id)?.content;
        let classification = self.classifier.classify(&content, tier).await?;
        self.update_item(id, |item| {
            item.annotation = Some(classification.annotation);
            item.safety_flag = classification.safety_flag;
        })
    }

    pub fn delete_item(&self, id: &str) -> VaultResult<()> {
        let mut snapshot = self.store.load();
        let before = snapshot.items.len();
        snapshot.items.retain(|item| item.id != id);
        if snapshot.items.len() == before {
            return Err(VaultError::NotFound(format!("item {id}")));
        }
        self.store.save(&snapshot);
        info!(id, "item deleted");
        Ok(())
    }

    /// Removes every captured item and returns how many were removed.
    pub fn clear_items(&self) -> usize {
        let mut snapshot = self.store.load();
        let removed = snapshot.items.len();
        snapshot.items.clear();
        self.store.save(&snapshot);
        info!(removed, "items cleared");
        removed
    }

    fn ensure_not_captured(&self, content: &str) -> VaultResult<()> {
        let snapshot = self.store.load();
        if snapshot.items.iter().any(|item| item.same_content(content)) {
            return Err(VaultError::DuplicateContent);
        }
        Ok(())
    }

    fn insert_item(&self, item: CapturedItem) -> VaultResult<CapturedItem> {
        // Reload: the snapshot may have changed while the oracle was busy.
        let mut snapshot = self.store.load();
        if snapshot.items.iter().any(|i| i.same_content(&item.content)) {
            return Err(VaultError::DuplicateContent);
        }
        snapshot.items.insert(0, item.clone());
        self.store.save(&snapshot);
        info!(id = %item.id, category = %item.category, "item captured");
        self.mirror.mirror(MirrorReason::CaptureCreated, &snapshot);
        Ok(item)
    }

    fn find_item(&self, id: &str) -> VaultResult<CapturedItem> {
        self.store
            .load()
            .items
            .into_iter()
            .find(|item| item.id == id)
            .ok_or_else(|| VaultError::NotFound(format!("item {id}")))
    }

    fn update_item<F>(&self, id: &str, change: F) -> VaultResult<CapturedItem>
    where
        F: FnOnce(&mut CapturedItem),
    {
        let mut snapshot = self.store.load();
        let item = snapshot
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| VaultError::NotFound(format!("item {id}")))?;
        change(item);
        let updated = item.clone();
        self.store.save(&snapshot);
        Ok(updated)
    }

    // ── Gatekeepers and credentials ────────────────────────────────────

    pub fn create_gatekeeper(&self, username: &str, password: &str) -> VaultResult<GatekeeperAccount> {
        let access = self.access.lock();
        access.require_view()?;
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(VaultError::invalid("gatekeeper username and password are required"));
        }
        let account = GatekeeperAccount {
            id: new_id(),
            username: username.to_string(),
            secret_digest: secret_digest(password),
        };
        let mut snapshot = self.store.load();
        snapshot.gatekeepers.push(account.clone());
        self.store.save(&snapshot);
        drop(access);
        info!(id = %account.id, "gatekeeper created");
        self.mirror.mirror(MirrorReason::GatekeeperCreated, &snapshot);
        Ok(account)
    }

    /// Usernames of the stored gatekeeper accounts.
    pub fn gatekeepers(&self) -> VaultResult<Vec<String>> {
        self.access.lock().require_view()?;
        Ok(self
            .store
            .load()
            .gatekeepers
            .into_iter()
            .map(|g| g.username)
            .collect())
    }

    pub fn authorize_write(&self, username: &str, password: &str) -> VaultResult<()> {
        let gatekeepers = self.store.load().gatekeepers;
        self.access
            .lock()
            .authorize_write(username.trim(), password, &gatekeepers)
    }

    pub fn cancel_write(&self) {
        self.access.lock().cancel_write();
    }

    /// Writes one credential and spends the write authorization.
    pub fn add_credential(&self, new: NewCredential) -> VaultResult<CredentialRecord> {
        let mut access = self.access.lock();
        access.require_write()?;
        if new.application_name.trim().is_empty()
            || new.login_identifier.trim().is_empty()
            || new.secret.is_empty()
        {
            return Err(VaultError::invalid(
                "application name, login and password are required",
            ));
        }
        let record = NewCredential {
            application_name: new.application_name.trim().to_string(),
            login_identifier: new.login_identifier.trim().to_string(),
            ..new
        }
        .into_record();
        let mut snapshot = self.store.load();
        snapshot.credentials.push(record.clone());
        self.store.save(&snapshot);
        access.consume_write();
        drop(access);
        info!(id = %record.id, "credential stored");
        self.mirror.mirror(MirrorReason::CredentialCreated, &snapshot);
        Ok(record)
    }

    pub fn credentials(&self) -> VaultResult<Vec<CredentialRecord>> {
        self.access.lock().require_view()?;
        Ok(self.store.load().credentials)
    }

    pub fn credential_groups(&self) -> VaultResult<BTreeMap<String, Vec<CredentialRecord>>> {
        let credentials = self.credentials()?;
        Ok(group_by_application(&credentials))
    }

    pub fn delete_credential(&self, id: &str) -> VaultResult<()> {
        let mut snapshot = self.store.load();
        let before = snapshot.credentials.len();
        snapshot.credentials.retain(|record| record.id != id);
        if snapshot.credentials.len() == before {
            return Err(VaultError::NotFound(format!("credential {id}")));
        }
        self.store.save(&snapshot);
        info!(id, "credential deleted");
        Ok(())
    }

    // ── Export and backup ──────────────────────────────────────────────

    pub fn export_csv(&self) -> VaultResult<String> {
        let credentials = self.credentials()?;
        Ok(credentials_csv(&credentials, self.language()))
    }

    pub fn backup(&self) -> VaultResult<BackupDocument> {
        self.access.lock().require_view()?;
        Ok(BackupDocument::from_snapshot(&self.store.load()))
    }

    /// Replaces the whole vault with a backup and locks, so the next unlock
    /// checks the restored password.
    pub fn restore(&self, document: BackupDocument) -> VaultResult<()> {
        let mut access = self.access.lock();
        access.require_view()?;
        let mut snapshot: VaultSnapshot = document.into_snapshot();
        let mut kept: Vec<CapturedItem> = Vec::with_capacity(snapshot.items.len());
        for item in snapshot.items {
            if item.content.trim().is_empty() || kept.iter().any(|k| k.same_content(&item.content)) {
                continue;
            }
            kept.push(item);
        }
        snapshot.items = kept;
        self.store.save(&snapshot);
        access.lock();
        info!(
            items = snapshot.items.len(),
            credentials = snapshot.credentials.len(),
            "backup restored"
        );
        Ok(())
    }
}

fn check_password_strength(password: &str) -> VaultResult<()> {
    if password.chars().count() < MIN_MASTER_PASSWORD_LEN {
        return Err(VaultError::invalid(format!(
            "password must be at least {MIN_MASTER_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_color(color: &str) -> VaultResult<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(VaultError::invalid(format!("'{color}' is not a #rrggbb color")))
    }
}

fn extraction_note(language: DisplayLanguage) -> &'static str {
    match language {
        DisplayLanguage::Arabic => "تم استخراج هذا النص من صورة باحترافية.",
        DisplayLanguage::English => "This text was extracted from an image.",
    }
}
