//! Two-layer access gate.
//!
//! `Locked` → `ViewUnlocked` with the master password, `ViewUnlocked` →
//! `WriteUnlocked` with any gatekeeper account. Write authorization is spent
//! by a single credential write. Leaving the credentials view always locks.
//! Nothing here is persisted.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::crypto::{secret_digest, verify_secret};
use crate::error::{VaultError, VaultResult};
use crate::model::{GatekeeperAccount, VaultSettings};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessState {
    Locked,
    ViewUnlocked,
    WriteUnlocked,
}

/// Host UI contexts the vault cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewContext {
    Captures,
    Credentials,
    Settings,
}

#[derive(Debug)]
pub struct AccessController {
    state: AccessState,
}

impl Default for AccessController {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessController {
    pub fn new() -> Self {
        Self {
            state: AccessState::Locked,
        }
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    /// Checks the master password. The state only moves when `Locked`; an
    /// already unlocked controller still rejects a wrong password.
    pub fn unlock_view(&mut self, password: &str, settings: &VaultSettings) -> VaultResult<()> {
        if !verify_secret(password, &settings.view_secret_digest) {
            info!("view unlock rejected");
            return Err(VaultError::AuthFailed);
        }
        if self.state == AccessState::Locked {
            self.transition(AccessState::ViewUnlocked);
        }
        Ok(())
    }

    /// Enters `ViewUnlocked` directly after a first-run password setup.
    pub(crate) fn unlock_after_setup(&mut self) {
        self.transition(AccessState::ViewUnlocked);
    }

    pub fn authorize_write(
        &mut self,
        username: &str,
        password: &str,
        gatekeepers: &[GatekeeperAccount],
    ) -> VaultResult<()> {
        self.require_view()?;
        let digest = secret_digest(password);
        let matched = gatekeepers
            .iter()
            .any(|g| g.username == username && g.secret_digest == digest);
        if !matched {
            info!("write authorization rejected");
            return Err(VaultError::AuthFailed);
        }
        if self.state == AccessState::ViewUnlocked {
            self.transition(AccessState::WriteUnlocked);
        }
        Ok(())
    }

    pub fn cancel_write(&mut self) {
        if self.state == AccessState::WriteUnlocked {
            self.transition(AccessState::ViewUnlocked);
        }
    }

    /// Spends the write authorization after a completed credential write.
    pub fn consume_write(&mut self) {
        self.cancel_write();
    }

    pub fn lock(&mut self) {
        if self.state != AccessState::Locked {
            self.transition(AccessState::Locked);
        }
    }

    /// Any context other than the credentials view drops all access.
    pub fn context_changed(&mut self, to: ViewContext) {
        if to != ViewContext::Credentials {
            self.lock();
        }
    }

    pub fn require_view(&self) -> VaultResult<()> {
        match self.state {
            AccessState::Locked => Err(VaultError::AccessDenied {
                required: AccessState::ViewUnlocked,
                current: self.state,
            }),
            _ => Ok(()),
        }
    }

    pub fn require_write(&self) -> VaultResult<()> {
        match self.state {
            AccessState::WriteUnlocked => Ok(()),
            current => Err(VaultError::AccessDenied {
                required: AccessState::WriteUnlocked,
                current,
            }),
        }
    }

    fn transition(&mut self, to: AccessState) {
        info!(from = ?self.state, to = ?to, "access state changed");
        self.state = to;
    }
}
