//! Clipvault core: a local vault for clipboard captures and third-party
//! credentials.
//!
//! Captures are classified by a remote oracle before they are stored.
//! Credentials sit behind two gates: the master password unlocks viewing and
//! a gatekeeper account authorizes each single write. Selected mutations are
//! mirrored to a remote collector when one is configured.
//!
//! Persisted blobs are base64 over JSON. That hides content from a casual
//! look at the data directory and provides no confidentiality.

pub mod access;
pub mod classifier;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod export;
pub mod mirror;
pub mod model;
pub mod paths;
pub mod storage;
pub mod vault;

pub use access::{AccessState, ViewContext};
pub use classifier::{Classifier, ClassifierOracle, Tier};
pub use config::{DisplayLanguage, VaultConfig};
pub use error::{VaultError, VaultResult};
pub use mirror::{MirrorPayload, MirrorReason, MirrorTransport, SyncMirror};
pub use model::{CapturedItem, Category, CredentialRecord, NewCredential, Platform, VaultSnapshot};
pub use storage::Store;
pub use vault::{ClipboardSource, SettingsUpdate, Vault};
