//! Chain clients and transaction submission helpers.
//!
//! `ChainClient` signs with a local key (a pool actor). `control_provider`
//! returns an unsigned provider for fixture RPCs and for transactions sent
//! as an impersonated address, which anvil signs on our behalf.

use alloy::contract::{CallBuilder, CallDecoder};
use alloy::network::{Ethereum, EthereumWallet};
use alloy::primitives::Address;
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
};
use alloy::providers::{DynProvider, Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;

use crate::error::HarnessError;

/// The concrete provider type produced by `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type HttpProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
    Ethereum,
>;

/// A chain client wrapping an alloy provider with a local signer.
pub struct ChainClient {
    pub provider: HttpProvider,
    pub address: Address,
}

impl ChainClient {
    /// Create a client from an RPC URL and a signer.
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, HarnessError> {
        let address = signer.address();
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);
        Ok(Self { provider, address })
    }

    /// Create a client from a hex-encoded private key (with or without "0x").
    pub fn from_private_key(rpc_url: &str, private_key: &str) -> Result<Self, HarnessError> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| HarnessError::Config(format!("Invalid private key: {e}")))?;
        Self::new(rpc_url, signer)
    }

    pub fn provider(&self) -> &HttpProvider {
        &self.provider
    }

    /// Type-erased signing provider, for holders that outlive the client.
    pub fn dyn_provider(&self) -> DynProvider<Ethereum> {
        self.provider.clone().erased()
    }
}

/// Unsigned provider for fixture control and impersonated sends.
pub fn control_provider(rpc_url: &str) -> Result<DynProvider<Ethereum>, HarnessError> {
    let url = parse_url(rpc_url)?;
    Ok(ProviderBuilder::new().connect_http(url).erased())
}

fn parse_url(rpc_url: &str) -> Result<url::Url, HarnessError> {
    rpc_url
        .parse()
        .map_err(|e| HarnessError::Config(format!("Invalid RPC URL '{rpc_url}': {e}")))
}

/// Convert a contract-call error into a `HarnessError`, decoding the revert
/// reason from the error payload when there is one.
pub fn revert_error(context: &str, err: alloy::contract::Error) -> HarnessError {
    let reason = err
        .as_revert_data()
        .and_then(|data| alloy::sol_types::decode_revert_reason(&data));
    HarnessError::Reverted {
        context: context.to_string(),
        reason,
        message: err.to_string(),
    }
}

pub(crate) fn transport_revert(context: &str, err: alloy::transports::TransportError) -> HarnessError {
    let reason = err
        .as_error_resp()
        .and_then(|payload| payload.as_revert_data())
        .and_then(|data| alloy::sol_types::decode_revert_reason(&data));
    HarnessError::Reverted {
        context: context.to_string(),
        reason,
        message: err.to_string(),
    }
}

fn ensure_success(context: &str, receipt: TransactionReceipt) -> Result<TransactionReceipt, HarnessError> {
    if receipt.status() {
        Ok(receipt)
    } else {
        Err(HarnessError::Reverted {
            context: context.to_string(),
            reason: None,
            message: format!("transaction {} reverted", receipt.transaction_hash),
        })
    }
}

/// Send a contract call and wait for a successful receipt.
///
/// A revert during gas estimation surfaces with its decoded reason; a mined
/// but failed transaction surfaces without one.
pub async fn submit<P, D>(
    call: CallBuilder<P, D>,
    context: &str,
) -> Result<TransactionReceipt, HarnessError>
where
    P: Provider<Ethereum>,
    D: CallDecoder,
{
    let pending = call.send().await.map_err(|e| revert_error(context, e))?;
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| HarnessError::Rpc(format!("{context}: {e}")))?;
    tracing::debug!(
        context,
        tx = %receipt.transaction_hash,
        gas_used = receipt.gas_used,
        "transaction confirmed"
    );
    ensure_success(context, receipt)
}

/// Send a raw transaction request and wait for a successful receipt.
pub async fn submit_request<P>(
    provider: &P,
    tx: TransactionRequest,
    context: &str,
) -> Result<TransactionReceipt, HarnessError>
where
    P: Provider<Ethereum>,
{
    let pending = provider
        .send_transaction(tx)
        .await
        .map_err(|e| transport_revert(context, e))?;
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| HarnessError::Rpc(format!("{context}: {e}")))?;
    ensure_success(context, receipt)
}
