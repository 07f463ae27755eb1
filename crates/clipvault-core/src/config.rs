use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::paths::data_dir;

pub const DEFAULT_ORACLE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_FAST_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_DEEP_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Language of annotations, translations and export headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayLanguage {
    #[default]
    Arabic,
    English,
}

impl DisplayLanguage {
    pub fn parse(code: &str) -> Result<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Ok(DisplayLanguage::Arabic),
            "en" | "english" => Ok(DisplayLanguage::English),
            other => Err(anyhow!("unsupported display language '{other}'")),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayLanguage::Arabic => "Arabic",
            DisplayLanguage::English => "English",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub fast_model: String,
    pub deep_model: String,
    pub image_model: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_URL.to_string(),
            api_key: None,
            fast_model: DEFAULT_FAST_MODEL.to_string(),
            deep_model: DEFAULT_DEEP_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// HTTP relay that forwards payloads to the collector address. `None`
    /// disables the mirror.
    pub relay_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub oracle: OracleConfig,
    pub mirror: MirrorConfig,
    pub language: DisplayLanguage,
}

impl VaultConfig {
    /// Resolves configuration from `CLIPVAULT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match get("CLIPVAULT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => data_dir()?,
        };

        let defaults = OracleConfig::default();
        let oracle = OracleConfig {
            base_url: get("CLIPVAULT_ORACLE_URL").unwrap_or(defaults.base_url),
            api_key: get("CLIPVAULT_ORACLE_KEY"),
            fast_model: get("CLIPVAULT_FAST_MODEL").unwrap_or(defaults.fast_model),
            deep_model: get("CLIPVAULT_DEEP_MODEL").unwrap_or(defaults.deep_model),
            image_model: get("CLIPVAULT_IMAGE_MODEL").unwrap_or(defaults.image_model),
        };

        let mirror_off = get("CLIPVAULT_MIRROR")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "off" | "0" | "false"))
            .unwrap_or(false);
        let mirror = MirrorConfig {
            relay_url: if mirror_off {
                None
            } else {
                get("CLIPVAULT_MIRROR_RELAY")
            },
        };

        let language = match get("CLIPVAULT_LANGUAGE") {
            Some(code) => DisplayLanguage::parse(&code)?,
            None => DisplayLanguage::default(),
        };

        Ok(Self {
            data_dir,
            oracle,
            mirror,
            language,
        })
    }
}
