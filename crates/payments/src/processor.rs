//! Payment processor port and a configurable mock.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Card details handed to the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessRequest {
    pub card_number: String,
}

/// The processor's business decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl ProcessResult {
    pub fn approved() -> Self {
        Self {
            success: true,
            failure_reason: None,
        }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            failure_reason: Some(reason.into()),
        }
    }
}

/// The processor could not reach a decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("payment processor unavailable: {0}")]
    Unavailable(String),
}

/// Decides whether a charge goes through.
///
/// `Ok` with `success: false` is a business decline. `Err` is a technical
/// failure: no decision was made.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResult, ProcessorError>;
}

/// How [`MockPaymentProcessor`] answers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MockDecision {
    #[default]
    ApproveAll,
    DeclineAll(String),
    /// Declines the listed card numbers, approves the rest.
    DeclineCards(Vec<String>),
    /// Every call fails technically.
    Unavailable(String),
}

/// Simulated processor with fixed latency.
#[derive(Debug, Clone)]
pub struct MockPaymentProcessor {
    latency: Duration,
    decision: MockDecision,
}

impl MockPaymentProcessor {
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(300);

    pub fn new(decision: MockDecision) -> Self {
        Self {
            latency: Self::DEFAULT_LATENCY,
            decision,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new(MockDecision::default())
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResult, ProcessorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match &self.decision {
            MockDecision::ApproveAll => Ok(ProcessResult::approved()),
            MockDecision::DeclineAll(reason) => Ok(ProcessResult::declined(reason.clone())),
            MockDecision::DeclineCards(cards) if cards.contains(&request.card_number) => {
                Ok(ProcessResult::declined("card declined"))
            }
            MockDecision::DeclineCards(_) => Ok(ProcessResult::approved()),
            MockDecision::Unavailable(reason) => Err(ProcessorError::Unavailable(reason.clone())),
        }
    }
}
