//! Content classification backed by a remote oracle.
//!
//! The oracle is consumed as a plain request/response collaborator. No call
//! is retried; any failure surfaces as [`VaultError::ClassificationFailed`]
//! and the caller must not persist anything.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::DisplayLanguage;
use crate::error::{VaultError, VaultResult};
use crate::model::Category;

pub mod heuristics;
mod http;

pub use heuristics::guess_category;
pub use http::HttpOracle;

/// Cost/latency/quality selector for remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    #[default]
    Fast,
    Deep,
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Tier::Fast),
            "deep" => Ok(Tier::Deep),
            other => Err(format!("unknown tier '{other}' (use fast or deep)")),
        }
    }
}

/// What the oracle said about a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVerdict {
    /// `None` when the oracle returned no recognizable category.
    pub category: Option<Category>,
    pub annotation: String,
    pub safety_flag: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub annotation: String,
    pub safety_flag: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    /// Guesses the mime type from the file extension; unknown extensions are
    /// sent as PNG.
    pub fn from_path_bytes(path: &std::path::Path, bytes: Vec<u8>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let mime_type = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/png",
        };
        Self {
            bytes,
            mime_type: mime_type.to_string(),
        }
    }
}

#[async_trait]
pub trait ClassifierOracle: Send + Sync {
    async fn classify(
        &self,
        content: &str,
        tier: Tier,
        language: DisplayLanguage,
    ) -> anyhow::Result<RemoteVerdict>;

    async fn extract_text(&self, image: &ImageInput) -> anyhow::Result<String>;

    async fn translate(
        &self,
        text: &str,
        tier: Tier,
        target: DisplayLanguage,
    ) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Classifier {
    oracle: Arc<dyn ClassifierOracle>,
    language: DisplayLanguage,
}

impl Classifier {
    pub fn new(oracle: Arc<dyn ClassifierOracle>, language: DisplayLanguage) -> Self {
        Self { oracle, language }
    }

    pub fn language(&self) -> DisplayLanguage {
        self.language
    }

    /// Local heuristics first, then the oracle. The oracle's category wins
    /// whenever it returns one.
    pub async fn classify(&self, content: &str, tier: Tier) -> VaultResult<Classification> {
        let local = guess_category(content);
        debug!(?tier, ?local, "classifying content");
        let remote = self
            .oracle
            .classify(content, tier, self.language)
            .await
            .map_err(|e| VaultError::ClassificationFailed(e.to_string()))?;
        Ok(Classification {
            category: remote.category.or(local).unwrap_or(Category::Unknown),
            annotation: remote.annotation,
            safety_flag: remote.safety_flag,
        })
    }

    pub async fn extract_text(&self, image: &ImageInput) -> VaultResult<String> {
        debug!(mime = %image.mime_type, size = image.bytes.len(), "extracting text");
        self.oracle
            .extract_text(image)
            .await
            .map_err(|e| VaultError::ClassificationFailed(e.to_string()))
    }

    pub async fn translate(&self, text: &str, tier: Tier) -> VaultResult<String> {
        debug!(?tier, "translating content");
        self.oracle
            .translate(text, tier, self.language)
            .await
            .map_err(|e| VaultError::ClassificationFailed(e.to_string()))
    }
}
