use alloy::contract::SolCallBuilder;
use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use vault_harness::chain::{ChainClient, submit};
use vault_harness::contracts::{ICheapRebalancer, IVaultStorage};
use vault_harness::tokens::BalanceSnapshot;
use vault_harness::{DeploymentOrchestrator, DeploymentParams};

/// Price multiplier passed to the cheap rebalancer (0.9965).
const CHEAP_REBALANCE_MULTIPLIER: u64 = 996_500_000_000_000_000;
const CHEAP_REBALANCE_GAS_LIMIT: u64 = 4_000_000;

#[derive(Parser)]
#[command(name = "vault-ops", about = "One-off vault deployment and governance operations")]
struct Cli {
    #[arg(long, env = "RPC_URL", default_value = "http://127.0.0.1:8545")]
    rpc_url: String,

    #[arg(long, env = "OPS_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy and wire a fresh system with the local parameter set.
    Deploy {
        #[arg(long, env = "VAULT_GOVERNANCE")]
        governance: Address,
        #[arg(long, env = "VAULT_ARTIFACTS_DIR", default_value = "out")]
        artifacts_dir: String,
    },
    /// Trigger a rebalance through the cheap rebalancer.
    CheapRebalance {
        #[arg(long, env = "CHEAP_REBALANCER_ADDRESS")]
        rebalancer: Address,
    },
    /// Hand vault governance back from the cheap rebalancer.
    ReturnGovernance {
        #[arg(long, env = "CHEAP_REBALANCER_ADDRESS")]
        rebalancer: Address,
        #[arg(long, env = "VAULT_GOVERNANCE")]
        to: Address,
    },
    /// Print token balances of the rescue participants.
    RescueReport {
        #[arg(long, env = "VAULT_GOVERNANCE")]
        governance: Address,
        #[arg(long, env = "BIG_REBALANCER_ADDRESS")]
        rebalancer: Address,
        #[arg(long, env = "RESCUE_ADDRESS")]
        rescue: Address,
        #[arg(long, env = "VAULT_STORAGE_ADDRESS")]
        storage: Option<Address>,
    },
}

fn setup_log() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_err()
    {}
}

fn cheap_rebalance_call<P: Provider<Ethereum>>(
    rebalancer: &ICheapRebalancer::ICheapRebalancerInstance<P>,
) -> SolCallBuilder<&P, ICheapRebalancer::rebalanceCall> {
    rebalancer
        .rebalance(U256::ZERO, U256::from(CHEAP_REBALANCE_MULTIPLIER))
        .gas(CHEAP_REBALANCE_GAS_LIMIT)
}

fn armed() -> bool {
    std::env::var("VAULT_OPS_ARMED").is_ok_and(|v| v == "1")
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    setup_log();
    let cli = Cli::parse();

    if !armed() {
        tracing::warn!("VAULT_OPS_ARMED is not set to 1, refusing to send anything");
        return;
    }

    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = ChainClient::from_private_key(&cli.rpc_url, &cli.private_key)?;
    tracing::info!(signer = %client.address, rpc = %cli.rpc_url, "connected");

    match cli.command {
        Command::Deploy {
            governance,
            artifacts_dir,
        } => {
            let orchestrator = DeploymentOrchestrator::new(&client, artifacts_dir);
            let system = orchestrator
                .deploy_system_confirmed(governance, &DeploymentParams::local(), None)
                .await
                .context("local deployment")?;
            let a = system.addresses();
            println!("UniswapMath: {}", a.uniswap_math);
            println!("Vault: {}", a.vault);
            println!("VaultAuction: {}", a.auction);
            println!("VaultMath: {}", a.vault_math);
            println!("VaultTreasury: {}", a.treasury);
            println!("VaultStorage: {}", a.storage);
        }
        Command::CheapRebalance { rebalancer } => {
            let cheap = ICheapRebalancer::new(rebalancer, client.provider());
            let receipt = submit(cheap_rebalance_call(&cheap), "CheapRebalancer.rebalance").await?;
            tracing::info!(
                tx = %receipt.transaction_hash,
                gas_used = receipt.gas_used,
                "cheap rebalance sent"
            );
        }
        Command::ReturnGovernance { rebalancer, to } => {
            let cheap = ICheapRebalancer::new(rebalancer, client.provider());
            let receipt = submit(cheap.returnGovernance(to), "CheapRebalancer.returnGovernance").await?;
            tracing::info!(tx = %receipt.transaction_hash, %to, "governance returned");
        }
        Command::RescueReport {
            governance,
            rebalancer,
            rescue,
            storage,
        } => {
            if client.address != governance {
                bail!("signer {} is not governance {governance}", client.address);
            }
            if let Some(storage) = storage {
                let storage = IVaultStorage::new(storage, client.provider());
                let current = storage
                    .governance()
                    .call()
                    .await
                    .context("reading vault governance")?;
                tracing::info!(%current, "vault storage governance");
            }
            for (label, account) in [
                ("governance", governance),
                ("rebalancer", rebalancer),
                ("rescue", rescue),
            ] {
                let snapshot = BalanceSnapshot::take(client.provider(), account, None).await?;
                println!(
                    "{label} {account}: WETH {} USDC {} oSQTH {}",
                    snapshot.weth, snapshot.usdc, snapshot.osqth
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::providers::ProviderBuilder;
    use alloy::sol_types::SolCall;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cheap_rebalance_parses_address() {
        let cli = Cli::try_parse_from([
            "vault-ops",
            "--private-key",
            "0x01",
            "cheap-rebalance",
            "--rebalancer",
            "0x00000000000000000000000000000000000000aa",
        ])
        .unwrap();
        match cli.command {
            Command::CheapRebalance { rebalancer } => {
                assert_eq!(rebalancer, Address::with_last_byte(0xaa));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_cheap_rebalance_call_shape() {
        let provider = ProviderBuilder::new().connect_http("http://127.0.0.1:8545".parse().unwrap());
        let rebalancer = Address::with_last_byte(0xaa);
        let cheap = ICheapRebalancer::new(rebalancer, &provider);

        let call = cheap_rebalance_call(&cheap);
        let request = call.as_ref();
        assert_eq!(request.gas, Some(CHEAP_REBALANCE_GAS_LIMIT));
        assert_eq!(request.to, Some(rebalancer.into()));

        let decoded = ICheapRebalancer::rebalanceCall::abi_decode(call.calldata()).unwrap();
        assert_eq!(decoded.threshold, U256::ZERO);
        assert_eq!(decoded.newPriceMultiplier.to_string(), "996500000000000000");

        let to = Address::with_last_byte(0xbb);
        let handback = cheap.returnGovernance(to);
        assert_eq!(
            ICheapRebalancer::returnGovernanceCall::abi_decode(handback.calldata()).unwrap().to,
            to
        );
    }
}
