//! Scenario actors: pool signers mapped to roles, or impersonated
//! mainnet accounts when a scenario drives a live deployment.

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes};
use alloy::providers::DynProvider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;

use crate::chain::{ChainClient, submit_request};
use crate::error::HarnessError;
use crate::fixture::FixtureController;
use crate::funding::Impersonation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Governance,
    Depositor,
    Keeper,
    Swapper,
    Unauthorized,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Governance => "governance",
            Role::Depositor => "depositor",
            Role::Keeper => "keeper",
            Role::Swapper => "swapper",
            Role::Unauthorized => "unauthorized",
        };
        f.write_str(s)
    }
}

enum Signer {
    Local(DynProvider<Ethereum>),
    Impersonated(FixtureController),
}

/// A signing identity bound to one role for the length of a scenario.
pub struct Actor {
    role: Role,
    address: Address,
    signer: Signer,
}

impl Actor {
    pub fn local(role: Role, client: &ChainClient) -> Self {
        Self {
            role,
            address: client.address,
            signer: Signer::Local(client.dyn_provider()),
        }
    }

    /// An existing account driven through fixture impersonation. Each send
    /// takes and releases the impersonation lock, so funding may run
    /// between this actor's calls.
    pub fn impersonated(role: Role, address: Address, fixture: &FixtureController) -> Self {
        Self {
            role,
            address,
            signer: Signer::Impersonated(fixture.clone()),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_impersonated(&self) -> bool {
        matches!(self.signer, Signer::Impersonated(_))
    }

    /// Provider for reads and typed contract calls. Only a local actor's
    /// provider signs.
    pub fn provider(&self) -> &DynProvider<Ethereum> {
        match &self.signer {
            Signer::Local(provider) => provider,
            Signer::Impersonated(fixture) => fixture.provider(),
        }
    }

    /// Send `call` to `to` as this actor.
    pub async fn send<C: SolCall>(
        &self,
        to: Address,
        call: C,
        context: &str,
    ) -> Result<TransactionReceipt, HarnessError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(call.abi_encode()).into());
        self.send_tx(tx, context).await
    }

    pub async fn send_tx(
        &self,
        tx: TransactionRequest,
        context: &str,
    ) -> Result<TransactionReceipt, HarnessError> {
        tracing::debug!(role = %self.role, actor = %self.address, context, "sending");
        match &self.signer {
            Signer::Local(provider) => submit_request(provider, tx.from(self.address), context).await,
            Signer::Impersonated(fixture) => {
                let impersonation = Impersonation::acquire(fixture, self.address).await?;
                let sent = impersonation.send(tx, context).await;
                let released = impersonation.release().await;
                let receipt = sent?;
                released?;
                Ok(receipt)
            }
        }
    }
}

/// The node's pre-funded accounts, handed out by index.
pub struct SignerPool {
    rpc_url: String,
    signers: Vec<PrivateKeySigner>,
}

impl SignerPool {
    pub fn new(rpc_url: &str, signers: Vec<PrivateKeySigner>) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            signers,
        }
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    pub fn address(&self, index: usize) -> Result<Address, HarnessError> {
        Ok(self.signer(index)?.address())
    }

    pub fn client(&self, index: usize) -> Result<ChainClient, HarnessError> {
        ChainClient::new(&self.rpc_url, self.signer(index)?.clone())
    }

    pub fn actor(&self, role: Role, index: usize) -> Result<Actor, HarnessError> {
        let actor = Actor::local(role, &self.client(index)?);
        tracing::debug!(%role, index, address = %actor.address(), "actor selected");
        Ok(actor)
    }

    fn signer(&self, index: usize) -> Result<&PrivateKeySigner, HarnessError> {
        self.signers.get(index).ok_or_else(|| {
            HarnessError::Config(format!(
                "signer index {index} out of range; pool has {} accounts (raise ANVIL_ACCOUNTS)",
                self.signers.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn pool() -> SignerPool {
        let signer: PrivateKeySigner = HARDHAT_KEY_0.parse().unwrap();
        SignerPool::new("http://localhost:8545", vec![signer])
    }

    #[test]
    fn test_actor_from_pool() {
        let actor = pool().actor(Role::Governance, 0).unwrap();
        assert_eq!(actor.role(), Role::Governance);
        assert!(!actor.is_impersonated());
        assert_eq!(
            actor.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_index_out_of_range() {
        let err = pool().actor(Role::Keeper, 8).err().unwrap();
        assert!(err.to_string().contains("ANVIL_ACCOUNTS"));
    }

    #[test]
    fn test_impersonated_actor() {
        let fixture = FixtureController::new("http://localhost:8545", None, 1).unwrap();
        let governance = Address::repeat_byte(0x42);
        let actor = Actor::impersonated(Role::Governance, governance, &fixture);
        assert!(actor.is_impersonated());
        assert_eq!(actor.address(), governance);
        assert_eq!(Role::Swapper.to_string(), "swapper");
    }
}
