//! Harness configuration read from the environment.
//!
//! `.env` is loaded first (via `dotenvy`) so local overrides work without
//! exporting variables by hand.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;

use crate::deploy::SystemAddresses;
use crate::error::HarnessError;

/// Block every mainnet-fork scenario starts from unless it pins its own.
pub const DEFAULT_FORK_BLOCK: u64 = 15_173_789;

/// Anvil's default pool is 10 accounts; scenarios index up to 12.
pub const DEFAULT_SIGNER_COUNT: usize = 20;

pub const DEFAULT_ANVIL_TIMEOUT_MS: u64 = 45_000;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Archive node the local fixture forks from. `None` means scenarios
    /// that need mainnet state are skipped.
    pub fork_url: Option<String>,
    pub fork_block: u64,
    pub artifacts_dir: PathBuf,
    pub signer_count: usize,
    pub anvil_timeout: Duration,
    /// Live deployment to attach to, when all six addresses are configured.
    pub deployed: Option<SystemAddresses>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            fork_url: None,
            fork_block: DEFAULT_FORK_BLOCK,
            artifacts_dir: PathBuf::from("artifacts"),
            signer_count: DEFAULT_SIGNER_COUNT,
            anvil_timeout: Duration::from_millis(DEFAULT_ANVIL_TIMEOUT_MS),
            deployed: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HarnessError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let fork_url = lookup("ETH_RPC_URL").filter(|v| !v.trim().is_empty());
        let fork_block = parse_or("FORK_BLOCK", &lookup, defaults.fork_block)?;
        let artifacts_dir = lookup("VAULT_ARTIFACTS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.artifacts_dir);
        let signer_count = parse_or("ANVIL_ACCOUNTS", &lookup, defaults.signer_count)?;
        let timeout_ms = parse_or("ANVIL_TIMEOUT_MS", &lookup, DEFAULT_ANVIL_TIMEOUT_MS)?;

        Ok(Self {
            fork_url,
            fork_block,
            artifacts_dir,
            signer_count,
            anvil_timeout: Duration::from_millis(timeout_ms),
            deployed: deployed_addresses(&lookup)?,
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, HarnessError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| HarnessError::Config(format!("Invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}

fn parse_address(key: &str, raw: &str) -> Result<Address, HarnessError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| HarnessError::Config(format!("Invalid {key} '{raw}': {e}")))
}

/// All six addresses or none: a partial set cannot be attached to.
fn deployed_addresses<F>(lookup: &F) -> Result<Option<SystemAddresses>, HarnessError>
where
    F: Fn(&str) -> Option<String>,
{
    const KEYS: [&str; 6] = [
        "UNISWAP_MATH_ADDRESS",
        "VAULT_ADDRESS",
        "VAULT_AUCTION_ADDRESS",
        "VAULT_MATH_ADDRESS",
        "VAULT_TREASURY_ADDRESS",
        "VAULT_STORAGE_ADDRESS",
    ];

    let raw: Vec<Option<String>> = KEYS.iter().map(|k| lookup(k)).collect();
    if raw.iter().all(Option::is_none) {
        return Ok(None);
    }

    let mut parsed = [Address::ZERO; 6];
    for (i, (key, value)) in KEYS.iter().zip(raw).enumerate() {
        let value = value.ok_or_else(|| {
            HarnessError::Config(format!("{key} missing while other deployed addresses are set"))
        })?;
        parsed[i] = parse_address(key, &value)?;
    }

    Ok(Some(SystemAddresses {
        uniswap_math: parsed[0],
        vault: parsed[1],
        auction: parsed[2],
        vault_math: parsed[3],
        treasury: parsed[4],
        storage: parsed[5],
    }))
}
