use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default accent color of a fresh vault.
pub const DEFAULT_ACCENT_COLOR: &str = "#4f46e5";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Link,
    Email,
    Phone,
    Image,
    Unknown,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Text => "text",
            Category::Link => "link",
            Category::Email => "email",
            Category::Phone => "phone",
            Category::Image => "image",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Category::Text),
            "link" | "url" => Ok(Category::Link),
            "email" => Ok(Category::Email),
            "phone" => Ok(Category::Phone),
            "image" => Ok(Category::Image),
            "unknown" => Ok(Category::Unknown),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CapturedItem {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub captured_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl CapturedItem {
    pub fn new(content: String, category: Category) -> Self {
        Self {
            id: new_id(),
            content,
            category,
            captured_at: now_millis(),
            annotation: None,
            safety_flag: None,
            translation: None,
        }
    }

    /// Case-insensitive exact match used for capture dedupe.
    pub fn same_content(&self, other: &str) -> bool {
        self.content.to_lowercase() == other.to_lowercase()
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.content.to_lowercase().contains(&query)
            || self
                .annotation
                .as_deref()
                .map(|a| a.to_lowercase().contains(&query))
                .unwrap_or(false)
    }

    /// Targets the host can offer as follow-up actions for this item.
    pub fn actions(&self) -> Vec<ItemAction> {
        let content = self.content.trim();
        match self.category {
            Category::Link => {
                let url = if content.starts_with("http") {
                    content.to_string()
                } else {
                    format!("https://{content}")
                };
                vec![ItemAction::OpenLink(url)]
            }
            Category::Phone => {
                let digits: String = content.chars().filter(|c| c.is_ascii_digit()).collect();
                vec![
                    ItemAction::Call(format!("tel:{content}")),
                    ItemAction::Message(format!("https://wa.me/{digits}")),
                ]
            }
            Category::Email => vec![ItemAction::Mail(format!("mailto:{content}"))],
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemAction {
    OpenLink(String),
    Call(String),
    Message(String),
    Mail(String),
}

impl ItemAction {
    pub fn target(&self) -> &str {
        match self {
            ItemAction::OpenLink(t)
            | ItemAction::Call(t)
            | ItemAction::Message(t)
            | ItemAction::Mail(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Platform {
    Facebook,
    Instagram,
    Twitter,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::Twitter => "Twitter",
            Platform::Other => "Other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "twitter" => Ok(Platform::Twitter),
            "other" => Ok(Platform::Other),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub application_name: String,
    pub platform: Platform,
    pub login_identifier: String,
    pub secret: String,
    pub created_at: i64,
}

/// Input for a credential write; id and timestamp are assigned by the vault.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub application_name: String,
    pub platform: Platform,
    pub login_identifier: String,
    pub secret: String,
}

impl NewCredential {
    pub(crate) fn into_record(self) -> CredentialRecord {
        CredentialRecord {
            id: new_id(),
            application_name: self.application_name,
            platform: self.platform,
            login_identifier: self.login_identifier,
            secret: self.secret,
            created_at: now_millis(),
        }
    }
}

/// Groups credentials by exact application name.
pub fn group_by_application(
    credentials: &[CredentialRecord],
) -> BTreeMap<String, Vec<CredentialRecord>> {
    let mut groups: BTreeMap<String, Vec<CredentialRecord>> = BTreeMap::new();
    for record in credentials {
        groups
            .entry(record.application_name.clone())
            .or_default()
            .push(record.clone());
    }
    groups
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatekeeperAccount {
    pub id: String,
    pub username: String,
    pub secret_digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultSettings {
    #[serde(default)]
    pub collector_address: String,
    #[serde(default)]
    pub verification_identifier: String,
    #[serde(default)]
    pub view_secret_digest: String,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            collector_address: String::new(),
            verification_identifier: String::new(),
            view_secret_digest: String::new(),
            accent_color: default_accent_color(),
        }
    }
}

impl VaultSettings {
    pub fn has_master_password(&self) -> bool {
        !self.view_secret_digest.is_empty()
    }
}

fn default_accent_color() -> String {
    DEFAULT_ACCENT_COLOR.to_string()
}

/// The four collections, always read and written together.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    #[serde(default)]
    pub items: Vec<CapturedItem>,
    #[serde(default)]
    pub credentials: Vec<CredentialRecord>,
    #[serde(default)]
    pub gatekeepers: Vec<GatekeeperAccount>,
    #[serde(default)]
    pub settings: VaultSettings,
}

pub(crate) fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
