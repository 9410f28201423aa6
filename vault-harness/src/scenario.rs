//! Scenario runner support: named steps, literal-value assertions,
//! expected-revert checks and the bounded retry loop.

use std::future::Future;

use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use tracing::Instrument;

use crate::error::HarnessError;
use crate::fixture::BlockAdvancer;
use crate::tokens::balance_of;

/// A named sequence of steps. The first failing step fails the scenario
/// and is reported with both names.
pub struct Scenario {
    name: String,
    completed: Vec<String>,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        tracing::info!(scenario = name, "scenario started");
        Self {
            name: name.to_string(),
            completed: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn completed_steps(&self) -> &[String] {
        &self.completed
    }

    pub async fn step<T, Fut>(&mut self, step: &str, fut: Fut) -> Result<T, HarnessError>
    where
        Fut: Future<Output = Result<T, HarnessError>>,
    {
        let span = tracing::info_span!("step", scenario = %self.name, step);
        match fut.instrument(span).await {
            Ok(value) => {
                tracing::info!(scenario = %self.name, step, "step passed");
                self.completed.push(step.to_string());
                Ok(value)
            }
            Err(source) => Err(HarnessError::StepFailed {
                scenario: self.name.clone(),
                step: step.to_string(),
                source: Box::new(source),
            }),
        }
    }

    pub fn finish(self) {
        tracing::info!(scenario = %self.name, steps = self.completed.len(), "scenario passed");
    }
}

pub fn assert_exact(what: &str, actual: &str, expected: &str) -> Result<(), HarnessError> {
    if actual != expected {
        return Err(HarnessError::AssertionMismatch {
            what: what.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Read `account`'s balance of `token` and compare it to a literal.
pub async fn assert_balance<P>(
    provider: &P,
    account: Address,
    token: impl Into<Address>,
    expected: &str,
    what: &str,
) -> Result<(), HarnessError>
where
    P: Provider<Ethereum>,
{
    let actual = balance_of(provider, account, token).await?;
    assert_exact(what, &actual, expected)
}

/// Pass when `|actual - expected| < 10^(decimals - precision)`, i.e. the
/// two agree on the first `precision` decimal places of a `decimals`
/// token.
pub fn assert_within_precision(
    what: &str,
    actual: U256,
    expected: U256,
    precision: u8,
    decimals: u8,
) -> Result<(), HarnessError> {
    let tolerance = U256::from(10).pow(U256::from(decimals.saturating_sub(precision)));
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    if diff >= tolerance {
        return Err(HarnessError::AssertionMismatch {
            what: format!("{what} (within {tolerance})"),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

/// Pass only if `result` is a revert carrying exactly `expected`. A revert
/// wrapped in a failed step is matched on its inner reason.
pub fn expect_revert<T>(
    context: &str,
    result: Result<T, HarnessError>,
    expected: &str,
) -> Result<(), HarnessError> {
    let err = match result {
        Ok(_) => {
            return Err(HarnessError::UnexpectedSuccess {
                context: context.to_string(),
                expected: expected.to_string(),
            });
        }
        Err(err) => err,
    };
    let mismatch = |actual: String| HarnessError::RevertMismatch {
        context: context.to_string(),
        expected: expected.to_string(),
        actual,
    };
    match err.revert_reason().map(str::to_owned) {
        Some(reason) if reason == expected => {
            tracing::info!(context, reason = %reason, "reverted as expected");
            Ok(())
        }
        Some(reason) => Err(mismatch(reason)),
        None if err.is_revert() => Err(mismatch(err.to_string())),
        None => Err(err),
    }
}

/// Outcome of one attempt in the retry loop, decoded from the revert
/// payload rather than the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Mined without reverting. The rebalancer only reports a profitable
    /// path through the success marker, so this keeps the loop searching.
    Completed,
    KnownTransient(String),
    Unrecognized(String),
}

#[derive(Debug, Clone)]
pub struct RevertClassifier {
    success_marker: String,
    known_codes: Vec<String>,
}

impl Default for RevertClassifier {
    /// `Success` is the rebalancer's profitable-path marker; `STF` is the
    /// Uniswap transfer failure seen while prices are out of range.
    fn default() -> Self {
        Self::new("Success", &["STF"])
    }
}

impl RevertClassifier {
    pub fn new(success_marker: &str, known_codes: &[&str]) -> Self {
        Self {
            success_marker: success_marker.to_string(),
            known_codes: known_codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Only a revert carrying exactly the success marker counts as success.
    pub fn classify<T>(&self, result: &Result<T, HarnessError>) -> AttemptOutcome {
        let err = match result {
            Ok(_) => return AttemptOutcome::Completed,
            Err(err) => err,
        };
        match err.revert_reason() {
            Some(reason) if reason == self.success_marker => AttemptOutcome::Success,
            Some(reason) if self.known_codes.iter().any(|c| c == reason) => {
                AttemptOutcome::KnownTransient(reason.to_string())
            }
            Some(reason) => AttemptOutcome::Unrecognized(reason.to_string()),
            None => AttemptOutcome::Unrecognized(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub blocks_between: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            blocks_between: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Searching,
    Succeeded,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Every iteration the loop ran, with its classified outcome.
#[derive(Debug, Clone)]
pub struct RetryReport {
    pub state: PollState,
    pub attempts: Vec<AttemptRecord>,
}

impl RetryReport {
    pub fn succeeded_at(&self) -> Option<u32> {
        self.attempts
            .iter()
            .find(|r| r.outcome == AttemptOutcome::Success)
            .map(|r| r.attempt)
    }

    pub fn count_known_transient(&self) -> usize {
        self.attempts
            .iter()
            .filter(|r| matches!(r.outcome, AttemptOutcome::KnownTransient(_)))
            .count()
    }

    pub fn into_result(self) -> Result<Self, HarnessError> {
        match self.state {
            PollState::Succeeded => Ok(self),
            _ => Err(HarnessError::RetryExhausted {
                attempts: self.attempts.len() as u32,
            }),
        }
    }
}

/// Run `attempt` until it succeeds or `policy.max_attempts` is reached,
/// mining `policy.blocks_between` blocks between attempts.
///
/// Failed attempts never abort the loop; only a fixture error does.
pub async fn poll_until_success<A, F, Fut, T>(
    policy: &RetryPolicy,
    classifier: &RevertClassifier,
    chain: &A,
    mut attempt: F,
) -> Result<RetryReport, HarnessError>
where
    A: BlockAdvancer + ?Sized,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, HarnessError>>,
{
    let mut state = PollState::Searching;
    let mut attempts = Vec::new();

    for n in 1..=policy.max_attempts {
        let result = attempt(n).await;
        let outcome = classifier.classify(&result);
        match &outcome {
            AttemptOutcome::Success => tracing::info!(attempt = n, "attempt succeeded"),
            AttemptOutcome::Completed => {
                tracing::warn!(attempt = n, "attempt mined without the success marker")
            }
            AttemptOutcome::KnownTransient(code) => {
                tracing::warn!(attempt = n, code = %code, "attempt failed with known code")
            }
            AttemptOutcome::Unrecognized(message) => {
                tracing::warn!(attempt = n, message = %message, "attempt failed")
            }
        }
        let succeeded = outcome == AttemptOutcome::Success;
        attempts.push(AttemptRecord { attempt: n, outcome });

        if succeeded {
            state = PollState::Succeeded;
            break;
        }
        if n < policy.max_attempts {
            chain.advance_blocks(policy.blocks_between).await?;
        }
    }

    if state == PollState::Searching {
        state = PollState::Exhausted;
    }
    Ok(RetryReport { state, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingChain {
        mined: AtomicU64,
    }

    #[async_trait]
    impl BlockAdvancer for CountingChain {
        async fn advance_blocks(&self, count: u64) -> Result<(), HarnessError> {
            self.mined.fetch_add(count, Ordering::SeqCst);
            Ok(())
        }
    }

    fn revert(reason: &str) -> HarnessError {
        HarnessError::Reverted {
            context: "rebalance".into(),
            reason: Some(reason.into()),
            message: format!("execution reverted: {reason}"),
        }
    }

    #[test]
    fn test_classify() {
        let classifier = RevertClassifier::default();
        assert_eq!(classifier.classify(&Ok::<_, HarnessError>(())), AttemptOutcome::Completed);
        assert_eq!(
            classifier.classify(&Err::<(), _>(revert("Success"))),
            AttemptOutcome::Success
        );
        assert_eq!(
            classifier.classify(&Err::<(), _>(revert("STF"))),
            AttemptOutcome::KnownTransient("STF".into())
        );
        assert_eq!(
            classifier.classify(&Err::<(), _>(revert("C10"))),
            AttemptOutcome::Unrecognized("C10".into())
        );
    }

    #[test]
    fn test_classify_matches_whole_reason() {
        let classifier = RevertClassifier::default();
        assert_eq!(
            classifier.classify(&Err::<(), _>(revert("NotSuccessful"))),
            AttemptOutcome::Unrecognized("NotSuccessful".into())
        );
        let rpc = HarnessError::Rpc("connection refused".into());
        assert!(matches!(
            classifier.classify(&Err::<(), _>(rpc)),
            AttemptOutcome::Unrecognized(m) if m.contains("connection refused")
        ));
    }

    #[tokio::test]
    async fn test_poll_stops_at_first_success() {
        let chain = CountingChain::default();
        let policy = RetryPolicy::default();
        let report = poll_until_success(&policy, &RevertClassifier::default(), &chain, |n| async move {
            match n {
                1 | 2 => Err::<(), _>(revert("STF")),
                3 => Err(revert("C10")),
                _ => Err(revert("Success")),
            }
        })
        .await
        .unwrap();

        assert_eq!(report.state, PollState::Succeeded);
        assert_eq!(report.attempts.len(), 4);
        assert_eq!(report.succeeded_at(), Some(4));
        assert_eq!(report.count_known_transient(), 2);
        assert_eq!(chain.mined.load(Ordering::SeqCst), 30);
        assert!(report.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_poll_exhausts_within_cap() {
        let chain = CountingChain::default();
        let policy = RetryPolicy {
            max_attempts: 5,
            blocks_between: 10,
        };
        let report = poll_until_success(&policy, &RevertClassifier::default(), &chain, |_| async {
            Err::<(), _>(revert("STF"))
        })
        .await
        .unwrap();

        assert_eq!(report.state, PollState::Exhausted);
        assert_eq!(report.attempts.len(), 5);
        assert!(report.attempts.iter().enumerate().all(|(i, r)| r.attempt == i as u32 + 1));
        assert_eq!(chain.mined.load(Ordering::SeqCst), 40);
        assert!(matches!(
            report.into_result(),
            Err(HarnessError::RetryExhausted { attempts: 5 })
        ));
    }

    #[tokio::test]
    async fn test_poll_keeps_searching_after_mined_attempt() {
        let chain = CountingChain::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            blocks_between: 10,
        };
        let report = poll_until_success(&policy, &RevertClassifier::default(), &chain, |_| async {
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();

        assert_eq!(report.state, PollState::Exhausted);
        assert_eq!(report.attempts.len(), 3);
        assert!(report.attempts.iter().all(|r| r.outcome == AttemptOutcome::Completed));
        assert_eq!(report.succeeded_at(), None);
        assert_eq!(chain.mined.load(Ordering::SeqCst), 20);

        let chain = CountingChain::default();
        let report = poll_until_success(&policy, &RevertClassifier::default(), &chain, |n| async move {
            match n {
                1 => Ok(()),
                _ => Err(revert("Success")),
            }
        })
        .await
        .unwrap();
        assert_eq!(report.state, PollState::Succeeded);
        assert_eq!(report.succeeded_at(), Some(2));
    }

    #[tokio::test]
    async fn test_poll_with_zero_cap_is_exhausted() {
        let chain = CountingChain::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            blocks_between: 10,
        };
        let report = poll_until_success(&policy, &RevertClassifier::default(), &chain, |_| async {
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
        assert_eq!(report.state, PollState::Exhausted);
        assert!(report.attempts.is_empty());
    }

    #[test]
    fn test_expect_revert() {
        assert!(expect_revert("withdraw", Err::<(), _>(revert("C6")), "C6").is_ok());
        assert!(matches!(
            expect_revert("withdraw", Ok(()), "C6"),
            Err(HarnessError::UnexpectedSuccess { .. })
        ));
        assert!(matches!(
            expect_revert("withdraw", Err::<(), _>(revert("C7")), "C6"),
            Err(HarnessError::RevertMismatch { actual, .. }) if actual == "C7"
        ));
        assert!(matches!(
            expect_revert("withdraw", Err::<(), _>(HarnessError::Rpc("timeout".into())), "C6"),
            Err(HarnessError::Rpc(_))
        ));
    }

    #[test]
    fn test_expect_revert_inside_failed_step() {
        let wrapped = |inner: HarnessError| HarnessError::StepFailed {
            scenario: "Macro test mainnet".into(),
            step: "withdraw1".into(),
            source: Box::new(inner),
        };
        assert!(expect_revert("withdraw", Err::<(), _>(wrapped(revert("C6"))), "C6").is_ok());
        assert!(matches!(
            expect_revert("withdraw", Err::<(), _>(wrapped(revert("C7"))), "C6"),
            Err(HarnessError::RevertMismatch { actual, .. }) if actual == "C7"
        ));
        let unreasoned = HarnessError::Reverted {
            context: "withdraw".into(),
            reason: None,
            message: "transaction reverted".into(),
        };
        assert!(matches!(
            expect_revert("withdraw", Err::<(), _>(wrapped(unreasoned)), "C6"),
            Err(HarnessError::RevertMismatch { .. })
        ));
    }

    #[test]
    fn test_within_precision() {
        let expected = U256::from(1_000_000_000_000_000_000u64);
        assert!(assert_within_precision("weth", expected + U256::from(99), expected, 16, 18).is_ok());
        assert!(assert_within_precision("weth", expected - U256::from(99), expected, 16, 18).is_ok());
        assert!(assert_within_precision("weth", expected + U256::from(100), expected, 16, 18).is_err());
        assert!(assert_within_precision("usdc", U256::from(5), U256::from(5), 6, 6).is_ok());
    }

    #[test]
    fn test_assert_exact() {
        assert!(assert_exact("shares", "17630456391863397407", "17630456391863397407").is_ok());
        let err = assert_exact("shares", "1", "2").unwrap_err();
        assert_eq!(err.to_string(), "Assertion failed for shares: expected 2, got 1");
    }

    #[tokio::test]
    async fn test_step_wraps_failures() {
        let mut scenario = Scenario::new("Macro test");
        let value = scenario.step("deposit1", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);

        let err = scenario
            .step("withdraw1", async { Err::<(), _>(revert("C6")) })
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            HarnessError::StepFailed { scenario, step, .. } if scenario == "Macro test" && step == "withdraw1"
        ));
        assert_eq!(err.revert_reason(), Some("C6"));
        assert_eq!(scenario.completed_steps(), ["deposit1".to_string()]);
    }
}
