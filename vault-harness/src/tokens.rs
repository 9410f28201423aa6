//! ERC20 query and approval helpers.
//!
//! Balances and allowances come back as exact base-unit decimal strings so
//! scenario assertions compare literals, never floats.

use alloy::network::Ethereum;
use alloy::primitives::{Address, U256, address};
use alloy::providers::Provider;

use crate::chain::{revert_error, submit};
use crate::contracts::IERC20;
use crate::error::HarnessError;

/// The three assets the vault holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Weth,
    Usdc,
    Osqth,
}

impl Token {
    pub const ALL: [Token; 3] = [Token::Weth, Token::Usdc, Token::Osqth];

    pub fn address(self) -> Address {
        match self {
            Token::Weth => address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            Token::Usdc => address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            Token::Osqth => address!("f1B99e3E573A1a9C5E6B2Ce818b617F0E664E86B"),
        }
    }

    /// Well-funded mainnet account the funding service impersonates by default.
    pub fn default_holder(self) -> Address {
        match self {
            Token::Weth => address!("2f0b23f53734252bda2277357e97e1517d6b042a"),
            Token::Usdc => address!("2e6907a0ce523ccb5532ffea2e411df1eee26607"),
            Token::Osqth => address!("94b86a218264c7c424c1476160d675a05ecb0b3d"),
        }
    }

    pub fn decimals(self) -> u8 {
        match self {
            Token::Usdc => 6,
            Token::Weth | Token::Osqth => 18,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Token::Weth => "WETH",
            Token::Usdc => "USDC",
            Token::Osqth => "oSQTH",
        }
    }
}

impl From<Token> for Address {
    fn from(token: Token) -> Self {
        token.address()
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parse a base-unit decimal string such as `"17630456391863397407"`.
pub fn parse_amount(amount: &str) -> Result<U256, HarnessError> {
    U256::from_str_radix(amount.trim(), 10)
        .map_err(|e| HarnessError::Config(format!("Invalid amount '{amount}': {e}")))
}

pub async fn balance_of<P>(
    provider: &P,
    account: Address,
    token: impl Into<Address>,
) -> Result<String, HarnessError>
where
    P: Provider<Ethereum>,
{
    Ok(raw_balance_of(provider, account, token).await?.to_string())
}

pub async fn raw_balance_of<P>(
    provider: &P,
    account: Address,
    token: impl Into<Address>,
) -> Result<U256, HarnessError>
where
    P: Provider<Ethereum>,
{
    IERC20::new(token.into(), provider)
        .balanceOf(account)
        .call()
        .await
        .map_err(|e| revert_error("balanceOf", e))
}

pub async fn allowance_of<P>(
    provider: &P,
    owner: Address,
    spender: Address,
    token: impl Into<Address>,
) -> Result<String, HarnessError>
where
    P: Provider<Ethereum>,
{
    let allowance = IERC20::new(token.into(), provider)
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| revert_error("allowance", e))?;
    Ok(allowance.to_string())
}

/// Approve `spender` for `amount`. `owner` is whoever signs for `provider`.
pub async fn approve<P>(
    owner: &P,
    spender: Address,
    amount: U256,
    token: impl Into<Address>,
) -> Result<(), HarnessError>
where
    P: Provider<Ethereum>,
{
    let token = token.into();
    submit(IERC20::new(token, owner).approve(spender, amount), "approve").await?;
    tracing::debug!(%token, %spender, %amount, "approved");
    Ok(())
}

/// Move the signer's whole balance of `token` to `to`.
pub async fn transfer_all<P>(
    from: &P,
    from_address: Address,
    to: Address,
    token: impl Into<Address>,
) -> Result<U256, HarnessError>
where
    P: Provider<Ethereum>,
{
    let token = token.into();
    let amount = raw_balance_of(from, from_address, token).await?;
    submit(IERC20::new(token, from).transfer(to, amount), "transfer").await?;
    Ok(amount)
}

/// Point-in-time balances of one account, used for logging and assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub account: Address,
    pub weth: String,
    pub usdc: String,
    pub osqth: String,
    /// Vault share balance, when a vault was given.
    pub shares: Option<String>,
}

impl BalanceSnapshot {
    pub async fn take<P>(
        provider: &P,
        account: Address,
        vault: Option<Address>,
    ) -> Result<Self, HarnessError>
    where
        P: Provider<Ethereum>,
    {
        let shares = match vault {
            Some(vault) => Some(balance_of(provider, account, vault).await?),
            None => None,
        };
        Ok(Self {
            account,
            weth: balance_of(provider, account, Token::Weth).await?,
            usdc: balance_of(provider, account, Token::Usdc).await?,
            osqth: balance_of(provider, account, Token::Osqth).await?,
            shares,
        })
    }

    pub fn get(&self, token: Token) -> &str {
        match token {
            Token::Weth => &self.weth,
            Token::Usdc => &self.usdc,
            Token::Osqth => &self.osqth,
        }
    }

    pub fn log(&self, label: &str) {
        tracing::info!(
            label,
            account = %self.account,
            weth = %self.weth,
            usdc = %self.usdc,
            osqth = %self.osqth,
            shares = self.shares.as_deref().unwrap_or("-"),
            "balances"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_metadata() {
        assert_eq!(Token::Usdc.decimals(), 6);
        assert_eq!(Token::Weth.decimals(), 18);
        assert_eq!(Token::Osqth.to_string(), "oSQTH");
        let addr: Address = Token::Weth.into();
        assert_eq!(addr, Token::Weth.address());
    }

    #[test]
    fn test_holders_are_distinct_from_tokens() {
        for token in Token::ALL {
            assert_ne!(token.default_holder(), token.address());
            assert_ne!(token.default_holder(), Address::ZERO);
        }
    }

    #[test]
    fn test_parse_amount_exact() {
        let amount = parse_amount("33072912443025954753").unwrap();
        assert_eq!(amount.to_string(), "33072912443025954753");
        assert!(parse_amount("1.5").is_err());
    }

    #[test]
    fn test_snapshot_get() {
        let snapshot = BalanceSnapshot {
            account: Address::ZERO,
            weth: "1".into(),
            usdc: "2".into(),
            osqth: "3".into(),
            shares: None,
        };
        assert_eq!(snapshot.get(Token::Usdc), "2");
        assert_eq!(snapshot.get(Token::Osqth), "3");
    }
}
