use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use clipvault_core::export::BackupDocument;
use clipvault_core::paths::default_backup_path;
use clipvault_core::{
    CapturedItem, NewCredential, Platform, SettingsUpdate, Tier, Vault, VaultConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

mod clipboard;

use crate::clipboard::StdinClipboard;

#[derive(Parser, Debug)]
#[command(author, version, about = "Clipvault: classified clipboard history and credential vault", long_about = None)]
struct Cli {
    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set the master password on first run
    Init {
        /// Identifier required later to rotate the master password
        #[arg(long)]
        identifier: Option<String>,
    },
    /// Classify and store text (from --text or piped stdin)
    Capture {
        #[arg(long)]
        text: Option<String>,
        #[arg(long, default_value = "fast")]
        tier: Tier,
    },
    /// Extract text from an image file and store it
    CaptureImage { path: PathBuf },
    /// List captured items, newest first
    List {
        #[arg(short, long)]
        query: Option<String>,
    },
    /// Translate an item into the display language
    Translate {
        id: String,
        #[arg(long, default_value = "fast")]
        tier: Tier,
    },
    /// Re-run classification on an item
    Reclassify {
        id: String,
        #[arg(long, default_value = "deep")]
        tier: Tier,
    },
    /// Delete one captured item
    Delete { id: String },
    /// Delete every captured item
    Clear,
    /// Create a gatekeeper account
    GatekeeperAdd { username: String },
    /// Store a credential (needs a gatekeeper)
    CredentialAdd {
        #[arg(long)]
        app: String,
        #[arg(long, default_value = "other")]
        platform: Platform,
        #[arg(long)]
        login: String,
        #[arg(long)]
        gatekeeper: String,
    },
    /// List credentials grouped by application
    Credentials,
    /// Delete one credential
    CredentialDelete { id: String },
    /// Export credentials as CSV
    ExportCsv {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write a plain JSON backup of the whole vault
    Backup {
        /// Defaults to a timestamped file under the data directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace the vault with a backup document
    Restore { path: PathBuf },
    /// Show or change settings
    Settings {
        #[arg(long)]
        collector: Option<String>,
        #[arg(long)]
        identifier: Option<String>,
        #[arg(long)]
        accent: Option<String>,
    },
    /// Replace the master password using the verification identifier
    RotatePassword {
        #[arg(long)]
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CLIPVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut config = VaultConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let vault = Arc::new(Vault::from_config(&config)?);
    info!(data_dir = %config.data_dir.display(), "vault opened");

    let result = run(&vault, &config.data_dir, cli.command).await;
    vault.mirror().flush().await;
    result
}

async fn run(vault: &Arc<Vault>, data_dir: &Path, command: Commands) -> Result<()> {
    if vault.needs_setup() && !matches!(command, Commands::Init { .. }) {
        return Err(anyhow!("no master password yet; run `clipvault init` first"));
    }
    match command {
        Commands::Init { identifier } => {
            let password = new_master_password("Create master password: ")?;
            vault.setup_master_password(&password, identifier.as_deref())?;
            println!("Master password set.");
        }
        Commands::Capture { text, tier } => {
            let item = match text {
                Some(text) => vault.capture(&text, tier).await?,
                None => vault.capture_from(&StdinClipboard, tier).await?,
            };
            print_item(&item);
        }
        Commands::CaptureImage { path } => {
            let item = vault.capture_image(&path).await?;
            print_item(&item);
        }
        Commands::List { query } => {
            let items = match query {
                Some(q) => vault.search(&q),
                None => vault.items(),
            };
            if items.is_empty() {
                println!("No items.");
            }
            for item in &items {
                print_item(item);
            }
        }
        Commands::Translate { id, tier } => {
            let item = vault.spawn_translate(id, tier).await??;
            println!("{}", item.translation.unwrap_or_default());
        }
        Commands::Reclassify { id, tier } => {
            let item = vault.reclassify_item(&id, tier).await?;
            print_item(&item);
        }
        Commands::Delete { id } => {
            vault.delete_item(&id)?;
            println!("Deleted {id}");
        }
        Commands::Clear => {
            let removed = vault.clear_items();
            println!("Removed {removed} items");
        }
        Commands::GatekeeperAdd { username } => {
            unlock(vault)?;
            let password = prompt_password_twice("Gatekeeper password: ")?;
            let account = vault.create_gatekeeper(&username, &password)?;
            println!("Gatekeeper {} created", account.username);
        }
        Commands::CredentialAdd {
            app,
            platform,
            login,
            gatekeeper,
        } => {
            unlock(vault)?;
            let gate = prompt("Gatekeeper password: ")?;
            vault.authorize_write(&gatekeeper, &gate)?;
            let secret = prompt("Credential password: ")?;
            let record = vault.add_credential(NewCredential {
                application_name: app,
                platform,
                login_identifier: login,
                secret: secret.to_string(),
            })?;
            println!("Stored {} ({})", record.application_name, record.id);
        }
        Commands::Credentials => {
            unlock(vault)?;
            let groups = vault.credential_groups()?;
            if groups.is_empty() {
                println!("No credentials.");
            }
            for (app, records) in groups {
                println!("{app}");
                for r in records {
                    println!(
                        "  {}  {}  {}  {}",
                        r.id,
                        r.platform,
                        r.login_identifier,
                        format_millis(r.created_at)
                    );
                }
            }
        }
        Commands::CredentialDelete { id } => {
            vault.delete_credential(&id)?;
            println!("Deleted {id}");
        }
        Commands::ExportCsv { out } => {
            unlock(vault)?;
            let csv = vault.export_csv()?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, csv)
                        .await
                        .with_context(|| format!("write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{csv}"),
            }
        }
        Commands::Backup { out } => {
            unlock(vault)?;
            let json = vault.backup()?.to_json()?;
            let out = match out {
                Some(path) => path,
                None => {
                    let path = default_backup_path(data_dir, Utc::now());
                    if let Some(parent) = path.parent() {
                        tokio::fs::create_dir_all(parent)
                            .await
                            .with_context(|| format!("create {}", parent.display()))?;
                    }
                    path
                }
            };
            tokio::fs::write(&out, json)
                .await
                .with_context(|| format!("write {}", out.display()))?;
            println!("Backup written to {}", out.display());
        }
        Commands::Restore { path } => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            let document = BackupDocument::from_json(&json)?;
            unlock(vault)?;
            vault.restore(document)?;
            println!("Vault restored from {}", path.display());
        }
        Commands::Settings {
            collector,
            identifier,
            accent,
        } => {
            unlock(vault)?;
            let settings = if collector.is_none() && identifier.is_none() && accent.is_none() {
                vault.settings()?
            } else {
                vault.update_settings(SettingsUpdate {
                    collector_address: collector,
                    verification_identifier: identifier,
                    accent_color: accent,
                })?
            };
            println!("collector:    {}", settings.collector_address);
            println!("identifier:   {}", settings.verification_identifier);
            println!("accent color: {}", settings.accent_color);
            println!("language:     {}", vault.language().name());
        }
        Commands::RotatePassword { identifier } => {
            let password = new_master_password("New master password: ")?;
            vault.rotate_master_password(&identifier, &password)?;
            println!("Master password replaced.");
        }
    }
    Ok(())
}

fn unlock(vault: &Vault) -> Result<()> {
    let password = master_password()?;
    vault.unlock(&password)?;
    Ok(())
}

fn master_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("CLIPVAULT_MASTER_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }
    prompt("Master password: ")
}

fn prompt(label: &str) -> Result<Zeroizing<String>> {
    let pw = rpassword::prompt_password(label).map_err(|e| anyhow!("password prompt: {e}"))?;
    Ok(Zeroizing::new(pw))
}

fn new_master_password(label: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var("CLIPVAULT_MASTER_PASSWORD") {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }
    prompt_password_twice(label)
}

fn prompt_password_twice(label: &str) -> Result<Zeroizing<String>> {
    let first = prompt(label)?;
    let second = prompt("Confirm password: ")?;
    if *first != *second {
        return Err(anyhow!("passwords do not match"));
    }
    Ok(first)
}

fn print_item(item: &CapturedItem) {
    let flag = if item.safety_flag == Some(false) {
        "  [unsafe]"
    } else {
        ""
    };
    println!(
        "{}  [{}]  {}{}",
        item.id,
        item.category,
        format_millis(item.captured_at),
        flag
    );
    println!("    {}", item.content);
    if let Some(note) = &item.annotation {
        println!("    > {note}");
    }
    if let Some(translation) = &item.translation {
        println!("    = {translation}");
    }
    for action in item.actions() {
        println!("    -> {}", action.target());
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}
