use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "clipvault";
pub const APP_NAME: &str = "clipvault";

const SLOTS_DIR: &str = "slots";
const BACKUPS_DIR: &str = "backups";

pub fn data_dir() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("cannot determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Directory holding the four encoded slot files.
pub fn slots_dir(data: &Path) -> PathBuf {
    data.join(SLOTS_DIR)
}

/// Where plain backups go when the user names no file.
pub fn backups_dir(data: &Path) -> PathBuf {
    data.join(BACKUPS_DIR)
}

/// `backups/clipvault-backup-<UTC timestamp>.json`, one file per backup.
pub fn default_backup_path(data: &Path, at: DateTime<Utc>) -> PathBuf {
    backups_dir(data).join(format!(
        "{APP_NAME}-backup-{}.json",
        at.format("%Y%m%d-%H%M%S")
    ))
}
