use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Fixture unavailable: {0}")]
    FixtureUnavailable(String),

    #[error("Deployment of {component} failed: {message}")]
    Deployment { component: String, message: String },

    #[error("Wiring incomplete: {0}")]
    Wiring(String),

    #[error("{context} reverted: {}", .reason.as_deref().unwrap_or(.message.as_str()))]
    Reverted {
        context: String,
        reason: Option<String>,
        message: String,
    },

    #[error("{context} succeeded, expected revert with '{expected}'")]
    UnexpectedSuccess { context: String, expected: String },

    #[error("{context} reverted with '{actual}', expected '{expected}'")]
    RevertMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("Assertion failed for {what}: expected {expected}, got {actual}")]
    AssertionMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("No successful attempt within {attempts} iterations")]
    RetryExhausted { attempts: u32 },

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Parameter mismatch for {contract}: constructor takes {expected} arguments, got {actual}")]
    ParameterMismatch {
        contract: String,
        expected: usize,
        actual: usize,
    },

    #[error("Impersonation error: {0}")]
    Impersonation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Scenario '{scenario}' failed at step '{step}': {source}")]
    StepFailed {
        scenario: String,
        step: String,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    /// The decoded revert reason, if this error is a revert that carried one.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            HarnessError::Reverted { reason, .. } => reason.as_deref(),
            HarnessError::StepFailed { source, .. } => source.revert_reason(),
            _ => None,
        }
    }

    /// Whether this error is a revert, with or without a decoded reason.
    pub fn is_revert(&self) -> bool {
        match self {
            HarnessError::Reverted { .. } => true,
            HarnessError::StepFailed { source, .. } => source.is_revert(),
            _ => false,
        }
    }
}

impl From<alloy::transports::TransportError> for HarnessError {
    fn from(e: alloy::transports::TransportError) -> Self {
        HarnessError::Rpc(e.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(e: serde_json::Error) -> Self {
        HarnessError::Serialization(e.to_string())
    }
}
