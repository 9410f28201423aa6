//! Deployment orchestrator for the six-component vault system.
//!
//! Components are deployed in an order resolved from their declared
//! dependencies, then every component except the math library is wired
//! with the full address set via `setComponents`. Against a local fixture
//! the whole sequence runs inside a `SetupBatch`, so nothing outside sees
//! a partially wired system.

use std::path::PathBuf;

use alloy::network::Ethereum;
use alloy::primitives::{Address, B256, Bytes, TxHash, TxKind, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider};
use alloy::rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest};

use crate::artifacts::Artifact;
use alloy::sol_types::SolCall;

use crate::chain::{ChainClient, revert_error, submit_request, transport_revert};
use crate::contracts::{IComponents, IComponentsGoverned, IVault, IVaultAuction, IVaultMath, IVaultStorage, IVaultTreasury};
use crate::error::HarnessError;
use crate::fixture::{FixtureController, SetupBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    UniswapMath,
    Vault,
    VaultAuction,
    VaultMath,
    VaultTreasury,
    VaultStorage,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::UniswapMath,
        Component::Vault,
        Component::VaultAuction,
        Component::VaultMath,
        Component::VaultTreasury,
        Component::VaultStorage,
    ];

    pub fn contract_name(self) -> &'static str {
        match self {
            Component::UniswapMath => "UniswapMath",
            Component::Vault => "Vault",
            Component::VaultAuction => "VaultAuction",
            Component::VaultMath => "VaultMath",
            Component::VaultTreasury => "VaultTreasury",
            Component::VaultStorage => "VaultStorage",
        }
    }

    /// Components that must exist before this one is deployed.
    pub fn depends_on(self) -> &'static [Component] {
        match self {
            Component::UniswapMath => &[],
            Component::Vault => &[Component::UniswapMath],
            Component::VaultAuction => &[Component::Vault],
            Component::VaultMath => &[Component::UniswapMath, Component::Vault],
            Component::VaultTreasury => &[Component::Vault],
            Component::VaultStorage => &[
                Component::Vault,
                Component::VaultAuction,
                Component::VaultMath,
                Component::VaultTreasury,
            ],
        }
    }

    /// The math library holds no registry and is never wired.
    pub fn is_wired(self) -> bool {
        self != Component::UniswapMath
    }
}

/// Order `nodes` so every node comes after its dependencies.
///
/// Among nodes whose dependencies are all placed, the one listed first in
/// `nodes` goes next, so the result is stable for a given input.
pub fn topological_order<T, F, D>(nodes: &[T], depends_on: F) -> Result<Vec<T>, HarnessError>
where
    T: Copy + PartialEq + std::fmt::Debug,
    F: Fn(T) -> D,
    D: AsRef<[T]>,
{
    for node in nodes {
        if let Some(dep) = depends_on(*node).as_ref().iter().find(|d| !nodes.contains(d)) {
            return Err(HarnessError::Deployment {
                component: format!("{node:?}"),
                message: format!("depends on {dep:?}, which is not part of the deployment"),
            });
        }
    }

    let mut remaining = nodes.to_vec();
    let mut ordered = Vec::with_capacity(nodes.len());
    while !remaining.is_empty() {
        let ready = remaining
            .iter()
            .position(|n| depends_on(*n).as_ref().iter().all(|d| ordered.contains(d)));
        match ready {
            Some(i) => ordered.push(remaining.remove(i)),
            None => {
                return Err(HarnessError::Deployment {
                    component: format!("{remaining:?}"),
                    message: "dependency cycle".into(),
                });
            }
        }
    }
    Ok(ordered)
}

/// A static constructor argument, encoded as one ABI word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructorArg {
    Uint(U256),
    Address(Address),
    Bool(bool),
}

impl ConstructorArg {
    fn word(&self) -> B256 {
        match self {
            ConstructorArg::Uint(v) => B256::from(v.to_be_bytes::<32>()),
            ConstructorArg::Address(a) => a.into_word(),
            ConstructorArg::Bool(b) => {
                let v = if *b { U256::from(1) } else { U256::ZERO };
                B256::from(v.to_be_bytes::<32>())
            }
        }
    }

    fn matches(&self, solidity_type: &str) -> bool {
        match self {
            ConstructorArg::Uint(_) => solidity_type.starts_with("uint"),
            ConstructorArg::Address(_) => solidity_type == "address",
            ConstructorArg::Bool(_) => solidity_type == "bool",
        }
    }
}

impl From<U256> for ConstructorArg {
    fn from(v: U256) -> Self {
        ConstructorArg::Uint(v)
    }
}

impl From<Address> for ConstructorArg {
    fn from(a: Address) -> Self {
        ConstructorArg::Address(a)
    }
}

impl From<bool> for ConstructorArg {
    fn from(b: bool) -> Self {
        ConstructorArg::Bool(b)
    }
}

/// Creation payload for `artifact` with `args`, checked against the
/// constructor ABI before anything is sent.
pub fn constructor_payload(artifact: &Artifact, args: &[ConstructorArg]) -> Result<Vec<u8>, HarnessError> {
    artifact.check_arity(args.len())?;
    for (i, (arg, ty)) in args.iter().zip(&artifact.constructor_inputs).enumerate() {
        if !arg.matches(ty) {
            return Err(HarnessError::Deployment {
                component: artifact.name.clone(),
                message: format!("constructor argument {i} is {arg:?}, ABI expects {ty}"),
            });
        }
    }
    let encoded: Vec<u8> = args.iter().flat_map(|a| a.word().0).collect();
    Ok(artifact.deploy_data(&encoded))
}

fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10).pow(U256::from(18))
}

/// Ordered numeric configuration for the storage constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentParams {
    values: Vec<U256>,
    /// Whether governance and keeper are appended after `values`.
    append_actors: bool,
    /// Whether `setComponents` also carries the governance address.
    wire_governance: bool,
}

impl DeploymentParams {
    pub fn new(values: Vec<U256>, append_actors: bool) -> Self {
        Self {
            values,
            append_actors,
            wire_governance: false,
        }
    }

    /// Switch wiring to the seven-argument `setComponents` that also takes
    /// governance.
    pub fn with_governance_wiring(mut self) -> Self {
        self.wire_governance = true;
        self
    }

    pub fn wires_governance(&self) -> bool {
        self.wire_governance
    }

    /// Mainnet-fork preset: cap, rebalance time threshold, price threshold,
    /// auction time, min/max price multipliers, protocol fee. Governance
    /// and keeper follow.
    pub fn mainnet() -> Self {
        Self::new(
            vec![
                ether(100),
                U256::from(43_200),
                U256::from(100_000_000_000_000_000u64),
                U256::from(1_200),
                U256::from(950_000_000_000_000_000u64),
                U256::from(1_050_000_000_000_000_000u64),
                U256::ZERO,
            ],
            true,
        )
    }

    /// Preset used for deployments on a plain local node. Governance is
    /// handed over through `setComponents` instead of the constructor.
    pub fn local() -> Self {
        Self::new(
            vec![
                ether(4_000_000_000_000),
                U256::from(10),
                U256::from(50_000_000_000_000_000u64),
                U256::from(10),
                U256::from(950_000_000_000_000_000u64),
                U256::from(1_050_000_000_000_000_000u64),
                U256::ZERO,
                U256::from(1_000),
                U256::from(1_000),
            ],
            false,
        )
        .with_governance_wiring()
    }

    pub fn values(&self) -> &[U256] {
        &self.values
    }

    /// Override one value by position.
    pub fn with(mut self, index: usize, value: U256) -> Result<Self, HarnessError> {
        let len = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            HarnessError::Config(format!("parameter index {index} out of range (have {len})"))
        })?;
        *slot = value;
        Ok(self)
    }

    pub fn constructor_args(&self, governance: Address, keeper: Address) -> Vec<ConstructorArg> {
        let mut args: Vec<ConstructorArg> = self.values.iter().copied().map(Into::into).collect();
        if self.append_actors {
            args.push(governance.into());
            args.push(keeper.into());
        }
        args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAddresses {
    pub uniswap_math: Address,
    pub vault: Address,
    pub auction: Address,
    pub vault_math: Address,
    pub treasury: Address,
    pub storage: Address,
}

impl SystemAddresses {
    fn empty() -> Self {
        Self {
            uniswap_math: Address::ZERO,
            vault: Address::ZERO,
            auction: Address::ZERO,
            vault_math: Address::ZERO,
            treasury: Address::ZERO,
            storage: Address::ZERO,
        }
    }

    pub fn get(&self, component: Component) -> Address {
        match component {
            Component::UniswapMath => self.uniswap_math,
            Component::Vault => self.vault,
            Component::VaultAuction => self.auction,
            Component::VaultMath => self.vault_math,
            Component::VaultTreasury => self.treasury,
            Component::VaultStorage => self.storage,
        }
    }

    fn set(&mut self, component: Component, address: Address) {
        let slot = match component {
            Component::UniswapMath => &mut self.uniswap_math,
            Component::Vault => &mut self.vault,
            Component::VaultAuction => &mut self.auction,
            Component::VaultMath => &mut self.vault_math,
            Component::VaultTreasury => &mut self.treasury,
            Component::VaultStorage => &mut self.storage,
        };
        *slot = address;
    }

    pub fn log(&self) {
        for component in Component::ALL {
            tracing::info!(address = %self.get(component), "{}", component.contract_name());
        }
    }
}

/// Calldata for `setComponents`. With `governance` set, the seven-argument
/// variant is encoded.
pub fn wiring_calldata(addresses: &SystemAddresses, governance: Option<Address>) -> Bytes {
    let a = addresses;
    let encoded = match governance {
        Some(governance) => IComponentsGoverned::setComponentsCall {
            _uniswapMath: a.uniswap_math,
            _vault: a.vault,
            _auction: a.auction,
            _vaultMath: a.vault_math,
            _vaultTreasury: a.treasury,
            _vaultStorage: a.storage,
            _governance: governance,
        }
        .abi_encode(),
        None => IComponents::setComponentsCall {
            _uniswapMath: a.uniswap_math,
            _vault: a.vault,
            _auction: a.auction,
            _vaultMath: a.vault_math,
            _vaultTreasury: a.treasury,
            _vaultStorage: a.storage,
        }
        .abi_encode(),
    };
    encoded.into()
}

/// Typed handles onto a deployed (or attached) system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemHandle {
    addresses: SystemAddresses,
}

impl SystemHandle {
    pub fn addresses(&self) -> &SystemAddresses {
        &self.addresses
    }

    pub fn vault<P: Provider<Ethereum>>(&self, provider: P) -> IVault::IVaultInstance<P> {
        IVault::new(self.addresses.vault, provider)
    }

    pub fn auction<P: Provider<Ethereum>>(&self, provider: P) -> IVaultAuction::IVaultAuctionInstance<P> {
        IVaultAuction::new(self.addresses.auction, provider)
    }

    pub fn math<P: Provider<Ethereum>>(&self, provider: P) -> IVaultMath::IVaultMathInstance<P> {
        IVaultMath::new(self.addresses.vault_math, provider)
    }

    pub fn treasury<P: Provider<Ethereum>>(&self, provider: P) -> IVaultTreasury::IVaultTreasuryInstance<P> {
        IVaultTreasury::new(self.addresses.treasury, provider)
    }

    pub fn storage<P: Provider<Ethereum>>(&self, provider: P) -> IVaultStorage::IVaultStorageInstance<P> {
        IVaultStorage::new(self.addresses.storage, provider)
    }

    pub fn registry<P: Provider<Ethereum>>(
        &self,
        component: Component,
        provider: P,
    ) -> IComponents::IComponentsInstance<P> {
        IComponents::new(self.addresses.get(component), provider)
    }
}

/// A single deployed auxiliary contract.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    pub name: String,
    pub address: Address,
    pub tx_hash: TxHash,
    pub confirmed: bool,
}

impl ContractHandle {
    /// Check the creation transaction was mined and left code behind.
    pub async fn ensure_deployed<P: Provider<Ethereum>>(&self, provider: &P) -> Result<(), HarnessError> {
        let receipt = provider
            .get_transaction_receipt(self.tx_hash)
            .await?
            .ok_or_else(|| self.failure(format!("transaction {} not mined", self.tx_hash)))?;
        if !receipt.status() {
            return Err(self.failure(format!("transaction {} reverted", self.tx_hash)));
        }
        let code = provider.get_code_at(self.address).await?;
        if code.is_empty() {
            return Err(self.failure(format!("no code at {}", self.address)));
        }
        Ok(())
    }

    fn failure(&self, message: String) -> HarnessError {
        HarnessError::Deployment {
            component: self.name.clone(),
            message,
        }
    }
}

pub struct DeploymentOrchestrator {
    deployer: DynProvider<Ethereum>,
    deployer_address: Address,
    artifacts_dir: PathBuf,
    fixture: Option<FixtureController>,
}

impl DeploymentOrchestrator {
    pub fn new(deployer: &ChainClient, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            deployer: deployer.dyn_provider(),
            deployer_address: deployer.address,
            artifacts_dir: artifacts_dir.into(),
            fixture: None,
        }
    }

    /// Enables batched deployment against a local fixture.
    pub fn with_fixture(mut self, fixture: FixtureController) -> Self {
        self.fixture = Some(fixture);
        self
    }

    pub fn deployer_address(&self) -> Address {
        self.deployer_address
    }

    /// Load every artifact and build its creation payload, in deployment
    /// order. Fails before any transaction if a constructor does not match.
    fn prepare(
        &self,
        governance: Address,
        params: &DeploymentParams,
        keeper: Address,
    ) -> Result<Vec<(Component, Vec<u8>)>, HarnessError> {
        topological_order(&Component::ALL, Component::depends_on)?
            .into_iter()
            .map(|component| {
                let artifact = Artifact::load(&self.artifacts_dir, component.contract_name())?;
                let args = match component {
                    Component::VaultStorage => params.constructor_args(governance, keeper),
                    _ => Vec::new(),
                };
                Ok((component, constructor_payload(&artifact, &args)?))
            })
            .collect()
    }

    /// Deploy and wire a fresh system inside one setup batch.
    ///
    /// `keeper` defaults to `governance`. On failure the batch is aborted
    /// and the fixture must be reset before trying again.
    pub async fn deploy_fresh_system(
        &self,
        governance: Address,
        params: &DeploymentParams,
        keeper: Option<Address>,
    ) -> Result<SystemHandle, HarnessError> {
        let fixture = self.fixture.as_ref().ok_or_else(|| HarnessError::Deployment {
            component: "system".into(),
            message: "batched deployment needs a local fixture".into(),
        })?;
        let payloads = self.prepare(governance, params, keeper.unwrap_or(governance))?;
        let wired_governance = params.wires_governance().then_some(governance);

        let batch = fixture.begin_setup().await?;
        let queued = match self.queue_system(&batch, payloads, wired_governance).await {
            Ok(queued) => queued,
            Err(e) => {
                if let Err(abort_err) = batch.abort().await {
                    tracing::error!("failed to abort setup batch: {abort_err}");
                }
                return Err(e);
            }
        };
        batch.commit().await?;

        let (addresses, wiring) = queued;
        for (component, hash) in wiring {
            self.mined_receipt(hash, component.contract_name()).await?;
        }

        let system = SystemHandle { addresses };
        self.verify_wiring(&system).await?;
        addresses.log();
        Ok(system)
    }

    /// Queue all creations, mine them, then queue the wiring calls.
    async fn queue_system(
        &self,
        batch: &SetupBatch,
        payloads: Vec<(Component, Vec<u8>)>,
        wired_governance: Option<Address>,
    ) -> Result<(SystemAddresses, Vec<(Component, TxHash)>), HarnessError> {
        let mut nonce = self.pending_nonce().await?;
        let mut addresses = SystemAddresses::empty();
        let mut creations = Vec::with_capacity(payloads.len());

        for (component, payload) in payloads {
            let pending = self
                .send_create(component.contract_name(), payload, nonce)
                .await?;
            addresses.set(component, self.deployer_address.create(nonce));
            creations.push((component, *pending.tx_hash()));
            nonce += 1;
        }
        batch.mine().await?;

        for (component, hash) in creations {
            let receipt = self.mined_receipt(hash, component.contract_name()).await?;
            if receipt.contract_address != Some(addresses.get(component)) {
                return Err(HarnessError::Deployment {
                    component: component.contract_name().into(),
                    message: format!(
                        "deployed at {:?}, expected {}",
                        receipt.contract_address,
                        addresses.get(component)
                    ),
                });
            }
        }

        let calldata = wiring_calldata(&addresses, wired_governance);
        let mut wiring = Vec::new();
        for component in Component::ALL.into_iter().filter(|c| c.is_wired()) {
            let context = format!("{}.setComponents", component.contract_name());
            let tx = self.wiring_tx(addresses.get(component), &calldata).nonce(nonce);
            let pending = self
                .deployer
                .send_transaction(tx)
                .await
                .map_err(|e| transport_revert(&context, e))?;
            wiring.push((component, *pending.tx_hash()));
            nonce += 1;
        }

        Ok((addresses, wiring))
    }

    /// Deploy and wire one transaction at a time, waiting for each receipt.
    /// Used on networks that cannot suspend block production.
    pub async fn deploy_system_confirmed(
        &self,
        governance: Address,
        params: &DeploymentParams,
        keeper: Option<Address>,
    ) -> Result<SystemHandle, HarnessError> {
        let payloads = self.prepare(governance, params, keeper.unwrap_or(governance))?;

        let mut addresses = SystemAddresses::empty();
        for (component, payload) in payloads {
            let nonce = self.pending_nonce().await?;
            let pending = self
                .send_create(component.contract_name(), payload, nonce)
                .await?;
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| HarnessError::Rpc(format!("{}: {e}", component.contract_name())))?;
            let address = receipt.contract_address.ok_or_else(|| HarnessError::Deployment {
                component: component.contract_name().into(),
                message: "no contract address in receipt".into(),
            })?;
            tracing::info!(%address, "deployed {}", component.contract_name());
            addresses.set(component, address);
        }

        let calldata = wiring_calldata(&addresses, params.wires_governance().then_some(governance));
        for component in Component::ALL.into_iter().filter(|c| c.is_wired()) {
            let tx = self.wiring_tx(addresses.get(component), &calldata);
            submit_request(
                &self.deployer,
                tx,
                &format!("{}.setComponents", component.contract_name()),
            )
            .await?;
        }

        let system = SystemHandle { addresses };
        self.verify_wiring(&system).await?;
        Ok(system)
    }

    /// Wrap an existing deployment. Every address must hold code.
    pub async fn attach_to_deployed_system(
        &self,
        addresses: SystemAddresses,
    ) -> Result<SystemHandle, HarnessError> {
        for component in Component::ALL {
            let address = addresses.get(component);
            let code = self.deployer.get_code_at(address).await?;
            if code.is_empty() {
                return Err(HarnessError::Deployment {
                    component: component.contract_name().into(),
                    message: format!("no code at {address}"),
                });
            }
        }
        tracing::info!(vault = %addresses.vault, "attached to deployed system");
        Ok(SystemHandle { addresses })
    }

    pub async fn deploy_standalone_contract(
        &self,
        name: &str,
        constructor_args: &[ConstructorArg],
        await_confirmation: bool,
    ) -> Result<ContractHandle, HarnessError> {
        let artifact = Artifact::load(&self.artifacts_dir, name)?;
        let payload = constructor_payload(&artifact, constructor_args)?;

        let nonce = self.pending_nonce().await?;
        let pending = self.send_create(name, payload, nonce).await?;
        let mut handle = ContractHandle {
            name: name.to_string(),
            address: self.deployer_address.create(nonce),
            tx_hash: *pending.tx_hash(),
            confirmed: false,
        };

        if await_confirmation {
            pending
                .get_receipt()
                .await
                .map_err(|e| HarnessError::Rpc(format!("{name}: {e}")))?;
            handle.ensure_deployed(&self.deployer).await?;
            handle.confirmed = true;
            tracing::info!(address = %handle.address, "deployed {name}");
        }
        Ok(handle)
    }

    /// Every wired component must report exactly the deployed address set.
    pub async fn verify_wiring(&self, system: &SystemHandle) -> Result<(), HarnessError> {
        let expected = system.addresses;
        for component in Component::ALL.into_iter().filter(|c| c.is_wired()) {
            let reported = read_registry(&system.registry(component, &self.deployer)).await?;
            if reported != expected {
                return Err(HarnessError::Wiring(format!(
                    "{} reports {reported:?}, expected {expected:?}",
                    component.contract_name()
                )));
            }
        }
        Ok(())
    }

    fn wiring_tx(&self, component: Address, calldata: &Bytes) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.deployer_address)
            .to(component)
            .input(TransactionInput::both(calldata.clone()))
    }

    async fn pending_nonce(&self) -> Result<u64, HarnessError> {
        Ok(self
            .deployer
            .get_transaction_count(self.deployer_address)
            .pending()
            .await?)
    }

    async fn send_create(
        &self,
        name: &str,
        payload: Vec<u8>,
        nonce: u64,
    ) -> Result<PendingTransactionBuilder<Ethereum>, HarnessError> {
        let mut tx = TransactionRequest::default()
            .from(self.deployer_address)
            .nonce(nonce)
            .input(TransactionInput::both(Bytes::from(payload)));
        tx.to = Some(TxKind::Create);

        self.deployer
            .send_transaction(tx)
            .await
            .map_err(|e| HarnessError::Deployment {
                component: name.to_string(),
                message: e.to_string(),
            })
    }

    async fn mined_receipt(&self, hash: TxHash, what: &str) -> Result<TransactionReceipt, HarnessError> {
        let receipt = self
            .deployer
            .get_transaction_receipt(hash)
            .await?
            .ok_or_else(|| HarnessError::Deployment {
                component: what.to_string(),
                message: format!("transaction {hash} was not mined"),
            })?;
        if !receipt.status() {
            return Err(HarnessError::Deployment {
                component: what.to_string(),
                message: format!("transaction {hash} reverted"),
            });
        }
        Ok(receipt)
    }
}

async fn read_registry<P: Provider<Ethereum>>(
    registry: &IComponents::IComponentsInstance<P>,
) -> Result<SystemAddresses, HarnessError> {
    let read = |e| revert_error("registry read", e);
    Ok(SystemAddresses {
        uniswap_math: registry.uniswapMath().call().await.map_err(read)?,
        vault: registry.vault().call().await.map_err(read)?,
        auction: registry.auction().call().await.map_err(read)?,
        vault_math: registry.vaultMath().call().await.map_err(read)?,
        treasury: registry.vaultTreasury().call().await.map_err(read)?,
        storage: registry.vaultStorage().call().await.map_err(read)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_order() {
        let order = topological_order(&Component::ALL, Component::depends_on).unwrap();
        assert_eq!(order, Component::ALL.to_vec());
    }

    #[test]
    fn test_order_independent_of_listing() {
        let mut shuffled = Component::ALL;
        shuffled.reverse();
        let order = topological_order(&shuffled, Component::depends_on).unwrap();
        for (i, component) in order.iter().enumerate() {
            for dep in component.depends_on() {
                let pos = order.iter().position(|c| c == dep).unwrap();
                assert!(pos < i, "{dep:?} must precede {component:?}");
            }
        }
        assert_eq!(order[0], Component::UniswapMath);
        assert_eq!(order[5], Component::VaultStorage);
    }

    #[test]
    fn test_cycle_detected() {
        let deps = |n: u8| match n {
            1 => vec![2],
            2 => vec![1],
            _ => vec![],
        };
        let err = topological_order(&[0u8, 1, 2], deps).unwrap_err();
        assert!(err.to_string().contains("dependency cycle"));
    }

    #[test]
    fn test_missing_dependency_detected() {
        let err = topological_order(&[Component::VaultStorage], Component::depends_on).unwrap_err();
        assert!(matches!(err, HarnessError::Deployment { .. }));
    }

    #[test]
    fn test_mainnet_params_with_actors() {
        let params = DeploymentParams::mainnet()
            .with(6, U256::from(10_000))
            .unwrap();
        assert_eq!(params.values()[0].to_string(), "100000000000000000000");
        assert_eq!(params.values()[6], U256::from(10_000));

        let governance = Address::repeat_byte(0xaa);
        let keeper = Address::repeat_byte(0xbb);
        let args = params.constructor_args(governance, keeper);
        assert_eq!(args.len(), 9);
        assert_eq!(args[7], ConstructorArg::Address(governance));
        assert_eq!(args[8], ConstructorArg::Address(keeper));
    }

    #[test]
    fn test_local_params_have_no_actors() {
        let args = DeploymentParams::local().constructor_args(Address::ZERO, Address::ZERO);
        assert_eq!(args.len(), 9);
        assert!(args.iter().all(|a| matches!(a, ConstructorArg::Uint(_))));
    }

    #[test]
    fn test_local_wiring_carries_governance() {
        let mut addresses = SystemAddresses::empty();
        for (i, component) in Component::ALL.into_iter().enumerate() {
            addresses.set(component, Address::repeat_byte(i as u8 + 1));
        }
        let governance = Address::repeat_byte(0xee);

        let local = DeploymentParams::local();
        assert!(local.wires_governance());
        let calldata = wiring_calldata(&addresses, local.wires_governance().then_some(governance));
        assert_eq!(calldata.len(), 4 + 7 * 32);
        assert_eq!(calldata[..4], IComponentsGoverned::setComponentsCall::SELECTOR);
        assert_eq!(&calldata[4 + 6 * 32 + 12..], governance.as_slice());
        assert_eq!(&calldata[4 + 5 * 32 + 12..4 + 6 * 32], addresses.storage.as_slice());

        let mainnet = DeploymentParams::mainnet().with(6, U256::from(10_000)).unwrap();
        assert!(!mainnet.wires_governance());
        let calldata = wiring_calldata(&addresses, mainnet.wires_governance().then_some(governance));
        assert_eq!(calldata.len(), 4 + 6 * 32);
        assert_eq!(calldata[..4], IComponents::setComponentsCall::SELECTOR);
        assert_ne!(
            IComponents::setComponentsCall::SELECTOR,
            IComponentsGoverned::setComponentsCall::SELECTOR
        );
    }

    #[test]
    fn test_with_out_of_range() {
        assert!(DeploymentParams::mainnet().with(7, U256::ZERO).is_err());
    }

    #[test]
    fn test_constructor_payload_checks_abi() {
        let artifact = Artifact {
            name: "VaultStorage".into(),
            bytecode: vec![0x60, 0x80],
            constructor_inputs: vec!["uint256".into(), "address".into()],
        };
        let governance = Address::repeat_byte(0x11);

        let payload = constructor_payload(
            &artifact,
            &[U256::from(43_200).into(), governance.into()],
        )
        .unwrap();
        assert_eq!(payload.len(), 2 + 64);
        assert_eq!(&payload[2 + 30..2 + 32], &[0xa8, 0xc0]);
        assert_eq!(&payload[2 + 44..], governance.as_slice());

        let err = constructor_payload(&artifact, &[U256::from(1).into()]).unwrap_err();
        assert!(matches!(err, HarnessError::ParameterMismatch { expected: 2, actual: 1, .. }));

        let err = constructor_payload(&artifact, &[governance.into(), governance.into()]).unwrap_err();
        assert!(err.to_string().contains("ABI expects uint256"));
    }

    #[test]
    fn test_system_addresses_by_component() {
        let mut addresses = SystemAddresses::empty();
        for (i, component) in Component::ALL.into_iter().enumerate() {
            addresses.set(component, Address::repeat_byte(i as u8 + 1));
        }
        assert_eq!(addresses.vault, Address::repeat_byte(2));
        assert_eq!(addresses.storage, Address::repeat_byte(6));
        assert_eq!(addresses.get(Component::VaultAuction), addresses.auction);
    }

    #[test]
    fn test_math_library_is_not_wired() {
        let wired: Vec<_> = Component::ALL.into_iter().filter(|c| c.is_wired()).collect();
        assert_eq!(wired.len(), 5);
        assert!(!wired.contains(&Component::UniswapMath));
    }
}
