pub mod error;
pub mod config;
pub mod contracts;
pub mod chain;
pub mod artifacts;
pub mod fixture;
pub mod tokens;
pub mod funding;
pub mod deploy;
pub mod actors;
pub mod scenario;
pub mod harness;

pub use actors::{Actor, Role, SignerPool};
pub use config::HarnessConfig;
pub use deploy::{DeploymentOrchestrator, DeploymentParams, SystemAddresses, SystemHandle};
pub use error::HarnessError;
pub use fixture::{BlockAdvancer, BlockInfo, FixtureController};
pub use funding::AccountFunder;
pub use harness::Harness;
pub use scenario::{RetryPolicy, RevertClassifier, Scenario};
pub use tokens::Token;
