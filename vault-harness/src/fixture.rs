//! Chain fixture controller.
//!
//! Drives the local anvil node through its test RPCs: fork reset to a
//! pinned block, block mining, automine toggling for batched setup, and
//! the impersonation and balance calls the funding service builds on.

use std::sync::Arc;

use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::ext::AnvilApi;
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::BlockNumberOrTag;
use alloy::rpc::types::anvil::Forking;
use alloy::transports::TransportError;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::chain::control_provider;
use crate::error::HarnessError;

fn rpc_failure(method: &'static str) -> impl FnOnce(TransportError) -> HarnessError {
    move |e| HarnessError::Rpc(format!("{method}: {e}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Anything that can move the chain forward by whole blocks.
///
/// The retry loop only needs this much of the fixture.
#[async_trait]
pub trait BlockAdvancer: Send + Sync {
    async fn advance_blocks(&self, count: u64) -> Result<(), HarnessError>;
}

#[derive(Clone)]
pub struct FixtureController {
    provider: DynProvider<Ethereum>,
    rpc_url: String,
    fork_url: Option<String>,
    default_block: u64,
    pub(crate) impersonation_lock: Arc<Mutex<()>>,
}

impl FixtureController {
    pub fn new(
        rpc_url: &str,
        fork_url: Option<String>,
        default_block: u64,
    ) -> Result<Self, HarnessError> {
        Ok(Self {
            provider: control_provider(rpc_url)?,
            rpc_url: rpc_url.to_string(),
            fork_url,
            default_block,
            impersonation_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn provider(&self) -> &DynProvider<Ethereum> {
        &self.provider
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub fn default_block(&self) -> u64 {
        self.default_block
    }

    /// Rewind the fork to `block` (or the configured default).
    ///
    /// Any failure here is fatal: the node cannot serve the requested
    /// height, so no literal expectation downstream can hold.
    pub async fn reset_to(&self, block: Option<u64>) -> Result<(), HarnessError> {
        let height = block.unwrap_or(self.default_block);
        let fork_url = self.fork_url.as_deref().ok_or_else(|| {
            HarnessError::FixtureUnavailable("no fork URL configured (set ETH_RPC_URL)".into())
        })?;

        let forking = Forking {
            json_rpc_url: Some(fork_url.to_string()),
            block_number: Some(height),
        };
        self.provider
            .anvil_reset(Some(forking))
            .await
            .map_err(|e| HarnessError::FixtureUnavailable(format!("reset to block {height}: {e}")))?;

        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| HarnessError::FixtureUnavailable(format!("reading head after reset: {e}")))?;
        if head != height {
            return Err(HarnessError::FixtureUnavailable(format!(
                "fork reset to {height} landed on {head}"
            )));
        }

        tracing::info!(block = height, "fork reset");
        Ok(())
    }

    /// Mine `count` empty blocks; each advances the timestamp by one second.
    pub async fn advance_blocks(&self, count: u64) -> Result<(), HarnessError> {
        if count == 0 {
            return Ok(());
        }
        self.provider
            .anvil_mine(Some(count), None)
            .await
            .map_err(rpc_failure("anvil_mine"))?;
        tracing::debug!(count, "mined blocks");
        Ok(())
    }

    /// Mine exactly one block containing whatever is pending.
    pub async fn mine(&self) -> Result<(), HarnessError> {
        self.provider.evm_mine(None).await.map_err(rpc_failure("evm_mine"))?;
        Ok(())
    }

    /// Mine one block stamped `timestamp`. Used instead of `advance_blocks`
    /// when the gap is too large to cover a second per block.
    pub async fn advance_time_to(&self, timestamp: u64) -> Result<(), HarnessError> {
        let current = self.current_block_info().await?;
        if timestamp <= current.timestamp {
            return Err(HarnessError::Rpc(format!(
                "cannot move time back from {} to {timestamp}",
                current.timestamp
            )));
        }
        self.provider
            .anvil_set_next_block_timestamp(timestamp)
            .await
            .map_err(rpc_failure("evm_setNextBlockTimestamp"))?;
        self.mine().await?;
        tracing::debug!(timestamp, "time advanced");
        Ok(())
    }

    pub async fn set_automine(&self, enabled: bool) -> Result<(), HarnessError> {
        self.provider
            .anvil_set_auto_mine(enabled)
            .await
            .map_err(rpc_failure("anvil_setAutomine"))
    }

    pub async fn current_block_info(&self) -> Result<BlockInfo, HarnessError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| HarnessError::Rpc("latest block missing".into()))?;
        Ok(BlockInfo {
            height: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    pub async fn log_block(&self) -> Result<BlockInfo, HarnessError> {
        let info = self.current_block_info().await?;
        tracing::info!(height = info.height, timestamp = info.timestamp, "block");
        Ok(info)
    }

    pub async fn set_balance(&self, account: Address, wei: U256) -> Result<(), HarnessError> {
        self.provider
            .anvil_set_balance(account, wei)
            .await
            .map_err(rpc_failure("anvil_setBalance"))
    }

    pub(crate) async fn start_impersonating(&self, account: Address) -> Result<(), HarnessError> {
        self.provider
            .anvil_impersonate_account(account)
            .await
            .map_err(|e| HarnessError::Impersonation(format!("start {account}: {e}")))?;
        Ok(())
    }

    pub(crate) async fn stop_impersonating(&self, account: Address) -> Result<(), HarnessError> {
        self.provider
            .anvil_stop_impersonating_account(account)
            .await
            .map_err(|e| HarnessError::Impersonation(format!("stop {account}: {e}")))?;
        Ok(())
    }

    /// Suspend automine so several transactions land without any
    /// observer seeing the intermediate state.
    pub async fn begin_setup(&self) -> Result<SetupBatch, HarnessError> {
        self.set_automine(false).await?;
        tracing::debug!("automine suspended");
        Ok(SetupBatch {
            fixture: self.clone(),
            finished: false,
        })
    }
}

#[async_trait]
impl BlockAdvancer for FixtureController {
    async fn advance_blocks(&self, count: u64) -> Result<(), HarnessError> {
        FixtureController::advance_blocks(self, count).await
    }
}

/// Transactional setup bracket: automine is off between `begin_setup` and
/// `commit`/`abort`.
pub struct SetupBatch {
    fixture: FixtureController,
    finished: bool,
}

impl SetupBatch {
    /// Mine what has been queued so far without leaving the batch.
    pub async fn mine(&self) -> Result<(), HarnessError> {
        self.fixture.mine().await
    }

    pub fn fixture(&self) -> &FixtureController {
        &self.fixture
    }

    /// Mine the remaining queued transactions and resume automine.
    /// Automine is resumed even when mining fails.
    pub async fn commit(mut self) -> Result<(), HarnessError> {
        let mined = self.fixture.mine().await;
        let resumed = self.fixture.set_automine(true).await;
        self.finished = resumed.is_ok();
        mined?;
        resumed?;
        tracing::debug!("automine resumed");
        Ok(())
    }

    /// Resume automine without mining. The fixture still holds whatever
    /// was mined before; a reset is needed before retrying the setup.
    pub async fn abort(mut self) -> Result<(), HarnessError> {
        let resumed = self.fixture.set_automine(true).await;
        self.finished = resumed.is_ok();
        resumed
    }
}

impl Drop for SetupBatch {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("setup batch dropped without commit, resuming automine");
        let fixture = self.fixture.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = fixture.set_automine(true).await {
                    tracing::error!("failed to resume automine: {e}");
                }
            });
        }
    }
}
