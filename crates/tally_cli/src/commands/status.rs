//! `status` command: show remote connection health.

use super::remote_config_from_env;
use std::sync::Arc;
use tally_remote::{AssumeOnline, HttpStatementExecutor, RemoteClient};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let remote_config = remote_config_from_env();
    let configured = remote_config.is_configured();

    if !configured {
        println!("Remote: not configured (set TALLY_REMOTE_URL)");
        return Ok(());
    }

    let executor = HttpStatementExecutor::new(
        remote_config.endpoint.clone(),
        remote_config.auth_token.clone(),
    )?;
    let client = RemoteClient::new(remote_config, executor, Arc::new(AssumeOnline));

    // One cheap round-trip to populate latency/health.
    let probe = client.query("SELECT 1", vec![]).await;

    let health = client.health();
    println!("Remote: configured");
    match probe {
        Ok(_) => println!("Reachable: yes"),
        Err(error) => println!("Reachable: no ({error})"),
    }
    if let Some(latency) = health.last_latency_ms {
        println!("Latency: {latency} ms");
    }
    if let Some(at) = health.last_healthy_at {
        println!("Last healthy at: {at} (epoch ms)");
    }
    if let Some(error) = health.last_error {
        println!("Last error: {error}");
    }
    if let Some(open_for) = health.circuit_open_for {
        println!("Circuit open for: {open_for:?}");
    }

    Ok(())
}
