use anyhow::Result;
use once_cell::sync::Lazy;
use std::sync::Once;
use tokio::sync::Mutex as AsyncMutex;
use tracing_subscriber::EnvFilter;
use vault_harness::{Harness, HarnessConfig};

/// Scenarios share one node-wide impersonation mode and pinned fork
/// state, so they never run concurrently.
pub static HARNESS_LOCK: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));
static LOG_INIT: Once = Once::new();

pub fn setup_log() {
    LOG_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with_test_writer()
            .try_init();
    });
}

/// Plain local anvil with no fork. Returns `None` if anvil is not
/// installed (graceful skip).
pub fn spawn_local() -> Result<Option<Harness>> {
    let config = HarnessConfig {
        fork_url: None,
        ..HarnessConfig::from_env()?
    };
    match Harness::spawn(config) {
        Ok(harness) => Ok(Some(harness)),
        Err(err) => {
            eprintln!("Skipping test: anvil not available: {err}");
            Ok(None)
        }
    }
}

/// Anvil forked from `ETH_RPC_URL` at `FORK_BLOCK`. Returns `None` when no
/// archive node is configured or the contracts have not been compiled.
pub fn spawn_fork() -> Result<Option<Harness>> {
    let config = HarnessConfig::from_env()?;
    if config.fork_url.is_none() {
        eprintln!("Skipping test: ETH_RPC_URL not set");
        return Ok(None);
    }
    if !config.artifacts_dir.exists() {
        eprintln!(
            "Skipping test: no contract artifacts at {}",
            config.artifacts_dir.display()
        );
        return Ok(None);
    }
    Ok(Some(Harness::spawn(config)?))
}
