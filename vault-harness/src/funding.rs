//! Account funding by impersonating token-rich mainnet holders.
//!
//! Impersonation is a node-wide mode: only one may be active per fixture,
//! and it must be released on every exit path before another actor
//! transacts. `Impersonation` holds the fixture's lock for its lifetime and
//! `grant_token_balance` releases it explicitly whether or not the
//! transfer succeeded.

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use tokio::sync::OwnedMutexGuard;

use crate::chain::submit_request;
use crate::contracts::IERC20;
use crate::error::HarnessError;
use crate::fixture::FixtureController;
use crate::tokens::{Token, approve};

/// Native balance given to an impersonated holder so it can pay for gas
/// (~100.8 ETH, enough for any number of transfers in one scenario).
pub const GAS_TOP_UP_WEI: U256 = U256::from_limbs([0x770e_9637_d9e0_a7c0, 0x5, 0, 0]);

/// An active impersonation of `account` on the fixture.
pub struct Impersonation {
    fixture: FixtureController,
    account: Address,
    // `None` once released.
    lock: Option<OwnedMutexGuard<()>>,
}

impl Impersonation {
    /// Wait for any other impersonation on this fixture to finish, then
    /// start impersonating `account`.
    pub async fn acquire(fixture: &FixtureController, account: Address) -> Result<Self, HarnessError> {
        let lock = fixture.impersonation_lock.clone().lock_owned().await;
        fixture.start_impersonating(account).await?;
        tracing::debug!(%account, "impersonating");
        Ok(Self {
            fixture: fixture.clone(),
            account,
            lock: Some(lock),
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Send `tx` as the impersonated account.
    pub async fn send(&self, tx: TransactionRequest, context: &str) -> Result<TransactionReceipt, HarnessError> {
        let tx = tx.from(self.account);
        submit_request(self.fixture.provider(), tx, context).await
    }

    /// Stop impersonating and drop the lock.
    pub async fn release(mut self) -> Result<(), HarnessError> {
        let lock = self.lock.take();
        let result = self.fixture.stop_impersonating(self.account).await;
        drop(lock);
        tracing::debug!(account = %self.account, "impersonation released");
        result
    }
}

impl Drop for Impersonation {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        // The lock moves into the task and is freed only after the node
        // has stopped impersonating.
        tracing::warn!(account = %self.account, "impersonation dropped without release");
        let fixture = self.fixture.clone();
        let account = self.account;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = fixture.stop_impersonating(account).await {
                    tracing::error!("failed to stop impersonating {account}: {e}");
                }
                drop(lock);
            });
        }
    }
}

/// Moves token balances from preconfigured mainnet holders to test actors.
#[derive(Clone)]
pub struct AccountFunder {
    fixture: FixtureController,
}

impl AccountFunder {
    pub fn new(fixture: FixtureController) -> Self {
        Self { fixture }
    }

    /// Transfer `amount` of `token` to `recipient` from `holder` (or the
    /// token's default holder). Impersonation is released before returning,
    /// including when the transfer reverts.
    pub async fn grant_token_balance(
        &self,
        token: Token,
        amount: U256,
        recipient: Address,
        holder: Option<Address>,
    ) -> Result<(), HarnessError> {
        let holder = holder.unwrap_or_else(|| token.default_holder());
        self.grant_erc20(token.address(), amount, recipient, holder).await?;
        tracing::info!(%token, %amount, %recipient, %holder, "granted token balance");
        Ok(())
    }

    /// Same as `grant_token_balance` for any ERC20 and an explicit holder.
    pub async fn grant_erc20(
        &self,
        token: Address,
        amount: U256,
        recipient: Address,
        holder: Address,
    ) -> Result<(), HarnessError> {
        let impersonation = Impersonation::acquire(&self.fixture, holder).await?;

        let transferred = self.transfer_as(&impersonation, token, amount, recipient).await;
        let released = impersonation.release().await;

        transferred?;
        released
    }

    async fn transfer_as(
        &self,
        impersonation: &Impersonation,
        token: Address,
        amount: U256,
        recipient: Address,
    ) -> Result<(), HarnessError> {
        self.fixture
            .set_balance(impersonation.account(), GAS_TOP_UP_WEI)
            .await?;

        let call = IERC20::transferCall {
            to: recipient,
            amount,
        };
        let tx = TransactionRequest::default()
            .to(token)
            .input(Bytes::from(call.abi_encode()).into());
        impersonation.send(tx, "transfer from holder").await?;
        Ok(())
    }

    /// Fund `actor` with all three assets and approve `spender` for each.
    ///
    /// Zero amounts are skipped. `actor_provider` must sign as `actor`.
    pub async fn fund_and_approve<P>(
        &self,
        actor_provider: &P,
        actor: Address,
        spender: Address,
        amounts: [U256; 3],
    ) -> Result<(), HarnessError>
    where
        P: alloy::providers::Provider<alloy::network::Ethereum>,
    {
        for (token, amount) in Token::ALL.into_iter().zip(amounts) {
            if amount.is_zero() {
                continue;
            }
            self.grant_token_balance(token, amount, actor, None).await?;
            approve(actor_provider, spender, amount, token).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_top_up_value() {
        assert_eq!(GAS_TOP_UP_WEI.to_string(), "100812679875357878208");
    }
}
