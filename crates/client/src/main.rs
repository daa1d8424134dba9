use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use common::pairing::{self, PairingPayload};
use vaultsync_client::conflict::Resolution;
use vaultsync_client::sync::{SyncPhase, SyncStatus};
use vaultsync_client::{
    AlwaysResolve, BaseContentStore, FsVault, RetryPolicy, Settings, SettingsStore, SyncObserver,
    SyncService, Transport,
};

#[derive(Debug, Parser)]
#[command(name = "vaultsync", version, about = "Sync a notes directory with a Vaultsync server")]
struct Cli {
    /// Settings file; defaults to the platform config directory.
    #[arg(long, env = "VAULTSYNC_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one sync cycle against the configured server.
    Sync {
        /// Directory holding the notes.
        #[arg(long, default_value = ".")]
        vault_dir: PathBuf,
        /// How to answer conflict prompts in this non-interactive run.
        #[arg(long, value_enum, default_value_t = OnConflict::Cancel)]
        on_conflict: OnConflict,
    },
    /// Show the server's cursor tips next to the local ones.
    Status,
    /// Drop local sync state (cursors, metadata, base content). Files stay.
    Reset {
        #[arg(long, default_value = ".")]
        vault_dir: PathBuf,
    },
    /// Print a setup URI for pairing another device, or import one.
    Pair {
        /// Passphrase protecting the payload.
        #[arg(long)]
        passphrase: String,
        /// A URI to import instead of exporting the current settings.
        #[arg(long)]
        uri: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnConflict {
    Local,
    Remote,
    Cancel,
}

impl From<OnConflict> for Resolution {
    fn from(choice: OnConflict) -> Self {
        match choice {
            OnConflict::Local => Resolution::UseLocal,
            OnConflict::Remote => Resolution::UseRemote,
            OnConflict::Cancel => Resolution::Cancel,
        }
    }
}

struct CliObserver;

impl SyncObserver for CliObserver {
    fn on_status(&self, status: SyncStatus) {
        match status {
            SyncStatus::Syncing => eprintln!("{}", "syncing...".dimmed()),
            SyncStatus::Success { message } => eprintln!("{} {message}", "ok".green().bold()),
            SyncStatus::Error { message } => eprintln!("{} {message}", "error".red().bold()),
            SyncStatus::Idle | SyncStatus::Paused => {}
        }
    }

    fn on_progress(&self, phase: SyncPhase, current: usize, total: usize) {
        let label = match phase {
            SyncPhase::PullDocuments => "pull",
            SyncPhase::PushDocuments => "push",
            SyncPhase::PushAttachments => "attachments",
        };
        eprintln!("{}", format!("  {label} {current}/{total}").dimmed());
    }

    fn on_reset(&self) {
        eprintln!("{}", "sync state was reset".yellow());
    }
}

fn default_settings_path() -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "vaultsync")
        .context("no home directory available")?;
    Ok(dirs.config_dir().join("settings.json"))
}

fn base_store_path(settings: &Settings) -> anyhow::Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "vaultsync")
        .context("no home directory available")?;
    Ok(dirs
        .data_dir()
        .join(format!("base-content-{}.db", settings.vault_id)))
}

async fn build_service(
    settings_store: SettingsStore,
    vault_dir: PathBuf,
    on_conflict: OnConflict,
) -> anyhow::Result<SyncService> {
    let settings = settings_store.load().context("loading settings")?;
    anyhow::ensure!(
        !settings.server_url.is_empty(),
        "no server configured; set serverUrl in {:?} or import a pairing URI",
        settings_store.path()
    );

    let base_store = BaseContentStore::open(base_store_path(&settings)?).await;
    let service = SyncService::new(
        settings,
        settings_store,
        Arc::new(FsVault::new(vault_dir)),
        Arc::new(AlwaysResolve(on_conflict.into())),
        base_store,
        Transport::new(RetryPolicy::default()),
    )
    .context("building sync service")?;
    Ok(service.with_observer(Arc::new(CliObserver)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => default_settings_path()?,
    };
    let settings_store = SettingsStore::new(settings_path);

    match cli.command {
        Command::Sync {
            vault_dir,
            on_conflict,
        } => {
            let mut service = build_service(settings_store, vault_dir, on_conflict).await?;
            let report = service.perform_sync().await;
            if let SyncStatus::Error { .. } = report.status {
                std::process::exit(1);
            }
        }
        Command::Status => {
            let settings = settings_store.load()?;
            anyhow::ensure!(!settings.server_url.is_empty(), "no server configured");
            let api = vaultsync_client::ApiClient::new(
                Transport::new(RetryPolicy::default()),
                &settings.server_url,
                &settings.api_key,
                &settings.vault_id,
            )?;
            let status = api.status().await?;
            println!(
                "server: last_seq={} last_attachment_seq={}",
                status.last_seq, status.last_attachment_seq
            );
            println!(
                "local:  last_seq={} last_attachment_seq={}",
                settings.last_seq, settings.last_attachment_seq
            );
        }
        Command::Reset { vault_dir } => {
            let mut service =
                build_service(settings_store, vault_dir, OnConflict::Cancel).await?;
            service.reset().await?;
            println!("sync state cleared");
        }
        Command::Pair { passphrase, uri } => match uri {
            Some(uri) => {
                let payload = pairing::decode_setup_uri(&uri, &passphrase)
                    .context("decoding pairing URI")?;
                let mut settings = settings_store.load()?;
                settings.server_url = payload.server_url;
                settings.api_key = payload.api_key;
                settings.vault_id = payload.vault_id;
                settings_store.save(&settings)?;
                println!("imported settings for vault {}", settings.vault_id);
            }
            None => {
                let settings = settings_store.load()?;
                anyhow::ensure!(!settings.server_url.is_empty(), "no server configured");
                let payload = PairingPayload::new(
                    settings.server_url.clone(),
                    settings.api_key.clone(),
                    settings.vault_id.clone(),
                );
                let uri = pairing::encode_setup_uri(&payload, &passphrase)?;
                println!("{uri}");
            }
        },
    }

    Ok(())
}
