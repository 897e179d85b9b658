//! `sync` command: run one push+pull cycle.

use super::remote_config_from_env;
use std::path::Path;
use std::sync::Arc;
use tally_remote::{AssumeOnline, HttpStatementExecutor, RemoteClient};
use tally_store::LocalStore;
use tally_sync::{SyncConfig, SyncEngine, SyncOutcome};

pub async fn run(db: &Path, user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let remote_config = remote_config_from_env();
    if !remote_config.is_configured() {
        return Err("no remote configured; set TALLY_REMOTE_URL".into());
    }

    let store = Arc::new(LocalStore::open(db)?);
    let executor = HttpStatementExecutor::new(
        remote_config.endpoint.clone(),
        remote_config.auth_token.clone(),
    )?;
    let remote = Arc::new(RemoteClient::new(
        remote_config,
        executor,
        Arc::new(AssumeOnline),
    ));

    let mut config = SyncConfig::new(user);
    if let Ok(client_id) = std::env::var("TALLY_CLIENT_ID") {
        if !client_id.is_empty() {
            config = config.with_client_id(client_id);
        }
    }

    let engine = SyncEngine::new(store, remote, config);
    match engine.run_full_sync().await {
        SyncOutcome::Completed(report) => {
            match report.push {
                Some(push) => println!(
                    "Pushed {} rows ({} deletions)",
                    push.total(),
                    push.deleted.len()
                ),
                None => println!("Push failed (rows stay queued for the next cycle)"),
            }
            match report.pull {
                Some(pull) => println!(
                    "Pulled {} rows (watermark {})",
                    pull.pulled, pull.last_sync
                ),
                None => println!("Pull failed (will catch up on the next cycle)"),
            }
        }
        SyncOutcome::Skipped(reason) => {
            println!("Sync skipped: {reason:?}");
        }
    }

    Ok(())
}
