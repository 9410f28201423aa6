//! One-call bootstrap: spawn a local anvil (forked when a fork URL is
//! configured) and build the fixture, funding and signer services on it.

use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::signers::local::PrivateKeySigner;

use crate::actors::SignerPool;
use crate::chain::ChainClient;
use crate::config::HarnessConfig;
use crate::deploy::DeploymentOrchestrator;
use crate::error::HarnessError;
use crate::fixture::FixtureController;
use crate::funding::AccountFunder;

pub struct Harness {
    pub config: HarnessConfig,
    pub fixture: FixtureController,
    pub funder: AccountFunder,
    pub signers: SignerPool,
    // Dropping the instance kills the node.
    anvil: AnvilInstance,
}

impl Harness {
    pub fn spawn(config: HarnessConfig) -> Result<Self, HarnessError> {
        let mut anvil = Anvil::new()
            .arg("--accounts")
            .arg(config.signer_count.to_string())
            .timeout(config.anvil_timeout.as_millis() as u64);
        if let Some(fork_url) = &config.fork_url {
            anvil = anvil.fork(fork_url.clone()).fork_block_number(config.fork_block);
        }
        let anvil = anvil
            .try_spawn()
            .map_err(|e| HarnessError::FixtureUnavailable(format!("spawning anvil: {e}")))?;

        let rpc_url = anvil.endpoint();
        let signers: Vec<PrivateKeySigner> = anvil.keys().iter().cloned().map(Into::into).collect();
        let fixture = FixtureController::new(&rpc_url, config.fork_url.clone(), config.fork_block)?;

        tracing::info!(
            rpc_url = %rpc_url,
            forked = config.fork_url.is_some(),
            block = config.fork_block,
            accounts = signers.len(),
            "anvil started"
        );

        Ok(Self {
            funder: AccountFunder::new(fixture.clone()),
            signers: SignerPool::new(&rpc_url, signers),
            fixture,
            config,
            anvil,
        })
    }

    pub fn rpc_url(&self) -> String {
        self.anvil.endpoint()
    }

    pub fn is_forked(&self) -> bool {
        self.config.fork_url.is_some()
    }

    /// Batched orchestrator with pool account 0 as deployer.
    pub fn orchestrator(&self) -> Result<DeploymentOrchestrator, HarnessError> {
        let deployer: ChainClient = self.signers.client(0)?;
        Ok(DeploymentOrchestrator::new(&deployer, &self.config.artifacts_dir)
            .with_fixture(self.fixture.clone()))
    }
}
