//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use avatar_prefs::domain::DomainError;
use avatar_prefs::{AvatarPrefsApi as _, AvatarPrefsModule, Identity, PreferenceSession};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Args, Subcommand};
use serde_json::json;
use stockdash_db::{ConnectionCache, SeaOrmConnector, probe_database};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::AppConfig;

/// Opens the shared connection once and reports the outcome.
pub async fn check_db(cfg: &AppConfig) -> Result<ExitCode> {
    let cache = ConnectionCache::new(SeaOrmConnector, &cfg.database)?;
    match cache.acquire().await {
        Ok(handle) => {
            info!(
                engine = %handle.engine(),
                dsn = %handle.dsn(),
                "Database connection established"
            );
            println!("Database connection OK ({}, {})", handle.engine(), handle.dsn());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Database connection failed");
            eprintln!("Database connection failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints a JSON health report; exit status follows the database probe.
pub async fn health(cfg: &AppConfig) -> Result<ExitCode> {
    let cache = ConnectionCache::new(SeaOrmConnector, &cfg.database)?;
    let db = probe_database(&cache).await;

    let report = json!({
        "ok": db.ok,
        "duration_ms": db.duration_ms,
        "db": { "ok": db.ok, "error": db.error },
        "env": {
            "name": std::env::var("STOCKDASH_ENV").unwrap_or_else(|_| "development".to_owned()),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "time": chrono::Utc::now().to_rfc3339(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if db.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Debug, Args)]
pub struct IdentityArgs {
    /// Stable user id (highest key priority)
    #[arg(long, global = true)]
    pub id: Option<String>,

    #[arg(long, global = true)]
    pub email: Option<String>,

    /// Display name
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Picture the identity provider has for this user
    #[arg(long, global = true)]
    pub image: Option<String>,
}

impl IdentityArgs {
    fn to_identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.name.clone(),
            image: self.image.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct AvatarArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Preference file (overrides `avatar.storage.path`)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub action: AvatarAction,
}

#[derive(Debug, Subcommand)]
pub enum AvatarAction {
    /// Print the stored preference and the resolved reference
    Show,
    /// Pick a fresh random seed
    Shuffle,
    /// Advance to the next style
    NextStyle,
    /// Pin a style by index (0-5)
    Pick { index: usize },
    /// Use an external image URL
    Link { url: String },
    /// Use a local image file (stored inline as a data URL)
    Upload { file: PathBuf },
    /// Forget the preference
    Reset,
    /// Print the reference every time it changes, until Ctrl-C
    Watch,
}

pub async fn avatar(cfg: &AppConfig, args: AvatarArgs) -> Result<ExitCode> {
    let mut avatar_cfg = cfg.avatar.clone();
    if let Some(store) = args.store {
        avatar_cfg.storage.path = Some(store);
    }
    let module = AvatarPrefsModule::init(avatar_cfg).context("failed to open avatar storage")?;
    let identity = args.identity.to_identity();

    match args.action {
        AvatarAction::Show => show(&module, &identity)?,
        AvatarAction::Shuffle => edit(&module, identity, |s| s.shuffle().map(|_| ()))?,
        AvatarAction::NextStyle => edit(&module, identity, |s| s.cycle_style().map(|_| ()))?,
        AvatarAction::Pick { index } => {
            edit(&module, identity, |s| s.pick_style(index).map(|_| ()))?;
        }
        AvatarAction::Link { url } => edit(&module, identity, |s| s.link_url(url).map(|_| ()))?,
        AvatarAction::Upload { file } => {
            let payload = data_url(&file)?;
            edit(&module, identity, |s| s.upload(payload).map(|_| ()))?;
        }
        AvatarAction::Reset => {
            let client = module.client();
            client.reset_preference(&identity)?;
            println!("{}", client.resolve_avatar(&identity)?);
        }
        AvatarAction::Watch => watch(&module, identity).await?,
    }
    Ok(ExitCode::SUCCESS)
}

fn show(module: &AvatarPrefsModule, identity: &Identity) -> Result<()> {
    let client = module.client();
    let report = json!({
        "key": module.store().key_for(identity).as_str(),
        "preference": client.get_preference(identity)?,
        "url": client.resolve_avatar(identity)?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Runs one open -> change -> commit session and prints the committed reference.
fn edit<F>(module: &AvatarPrefsModule, identity: Identity, change: F) -> Result<()>
where
    F: FnOnce(&mut PreferenceSession) -> Result<(), DomainError>,
{
    let mut session = module.editor(identity);
    session.open()?;
    if let Err(e) = change(&mut session) {
        session.cancel();
        return Err(e.into());
    }
    let url = session.commit().context("failed to save avatar preference")?;
    println!("{url}");
    Ok(())
}

async fn watch(module: &AvatarPrefsModule, identity: Identity) -> Result<()> {
    let token = CancellationToken::new();
    let watcher = module.spawn_storage_watcher(token.clone());
    let view = module.mount(identity)?;
    let mut changes = view.changes();
    println!("{}", view.current());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            res = changes.changed() => {
                if res.is_err() {
                    break;
                }
                let url = changes.borrow_and_update().clone();
                println!("{url}");
            }
        }
    }

    token.cancel();
    if let Some(handle) = watcher {
        handle.await.context("storage watcher panicked")?;
    }
    Ok(())
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}
