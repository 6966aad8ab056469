//! Sync subcommand for the companion store.
//!
//! The companion store is a second database file, typically on storage a
//! paired device can also reach. Counters are max-merged so both files
//! converge no matter which side syncs first.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use prayerwheel_core::{Database, DevotionType};
use serde_json::json;

use super::{now, print_events, CliResult, Context};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Merge counters with the companion store
    Run {
        /// Companion database file (overrides persistence.shared_store_path)
        #[arg(long)]
        shared: Option<PathBuf>,
    },
    /// Show companion store configuration and who last wrote each counter
    Status {
        #[arg(long)]
        shared: Option<PathBuf>,
    },
}

/// Run the sync command.
pub fn run(action: SyncAction) -> CliResult {
    let ctx = Context::open()?;
    match action {
        SyncAction::Run { shared } => run_sync(&ctx, shared),
        SyncAction::Status { shared } => show_status(&ctx, shared),
    }
}

fn shared_path(ctx: &Context, arg: Option<PathBuf>) -> Option<PathBuf> {
    arg.or_else(|| ctx.config.persistence.shared_store_path.clone())
}

fn open_shared(ctx: &Context, path: &Path) -> CliResult<Database> {
    let mut shared = Database::open_at(path)?;
    if let Some(device_id) = ctx.db.device_id() {
        shared = shared.with_device_id(device_id);
    }
    Ok(shared)
}

fn run_sync(ctx: &Context, shared: Option<PathBuf>) -> CliResult {
    let now = now();
    let mut wheel = ctx.wheel(now)?;

    let shared_db = match shared_path(ctx, shared) {
        Some(path) => Some(open_shared(ctx, &path)?),
        None => {
            eprintln!("No companion store configured (persistence.shared_store_path); nothing to sync.");
            None
        }
    };

    let events = wheel.sync_with(shared_db.as_ref(), now);
    if shared_db.is_some() && events.is_empty() {
        eprintln!("Already in sync.");
    }
    print_events(&events)?;
    ctx.save(&mut wheel, now)?;
    Ok(())
}

fn show_status(ctx: &Context, shared: Option<PathBuf>) -> CliResult {
    let path = shared_path(ctx, shared);
    let shared_db = match &path {
        Some(path) if path.exists() => Some(Database::open_at(path)?),
        _ => None,
    };

    let mut counters = Vec::new();
    for devotion in DevotionType::ALL {
        let local = ctx.db.counter_provenance(devotion)?;
        let remote = match &shared_db {
            Some(db) => db.counter_provenance(devotion)?,
            None => None,
        };
        counters.push(json!({
            "devotion": devotion,
            "local": local,
            "shared": remote,
        }));
    }

    let status = json!({
        "device_id": ctx.db.device_id(),
        "shared_store_path": path,
        "shared_store_present": shared_db.is_some(),
        "counters": counters,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
