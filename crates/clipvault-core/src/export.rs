use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DisplayLanguage;
use crate::model::{CapturedItem, CredentialRecord, GatekeeperAccount, VaultSettings, VaultSnapshot};

pub const BACKUP_FORMAT_VERSION: u32 = 1;

fn csv_header(language: DisplayLanguage) -> [&'static str; 5] {
    match language {
        DisplayLanguage::Arabic => [
            "المنصة",
            "اسم التطبيق",
            "البريد الإلكتروني",
            "كلمة المرور",
            "تاريخ الإنشاء",
        ],
        DisplayLanguage::English => [
            "Platform",
            "Application",
            "Login",
            "Password",
            "Created At",
        ],
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

/// One row per credential: platform, application, login, secret, created.
pub fn credentials_csv(credentials: &[CredentialRecord], language: DisplayLanguage) -> String {
    let mut out = String::new();
    out.push_str(&csv_header(language).join(","));
    out.push('\n');
    for record in credentials {
        let row = [
            csv_field(record.platform.as_str()),
            csv_field(&record.application_name),
            csv_field(&record.login_identifier),
            csv_field(&record.secret),
            csv_field(&format_millis(record.created_at)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Plain (not encoded) document holding all four collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub format_version: u32,
    pub exported_at: i64,
    #[serde(default)]
    pub items: Vec<CapturedItem>,
    #[serde(default)]
    pub credentials: Vec<CredentialRecord>,
    #[serde(default)]
    pub gatekeepers: Vec<GatekeeperAccount>,
    #[serde(default)]
    pub settings: VaultSettings,
}

impl BackupDocument {
    pub fn from_snapshot(snapshot: &VaultSnapshot) -> Self {
        Self {
            format_version: BACKUP_FORMAT_VERSION,
            exported_at: Utc::now().timestamp_millis(),
            items: snapshot.items.clone(),
            credentials: snapshot.credentials.clone(),
            gatekeepers: snapshot.gatekeepers.clone(),
            settings: snapshot.settings.clone(),
        }
    }

    pub fn into_snapshot(self) -> VaultSnapshot {
        VaultSnapshot {
            items: self.items,
            credentials: self.credentials,
            gatekeepers: self.gatekeepers,
            settings: self.settings,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
