use crate::domain::ports::{ChargeOutcome, ChargeRequest, PaymentGateway};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// An offline payment gateway.
///
/// Card and PayPal charges settle immediately with a generated transaction
/// id. Bank transfer and cash on delivery are approved without settling.
/// Outcomes are remembered per idempotency key, so a retried charge returns
/// the first answer.
#[derive(Debug, Default)]
pub struct SimulatedPaymentGateway {
    decline_reason: Option<String>,
    latency: Option<Duration>,
    outcomes: DashMap<String, ChargeOutcome>,
    requests: Mutex<Vec<ChargeRequest>>,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that declines every charge with `reason`.
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            decline_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Delays every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every charge request received, in arrival order.
    pub async fn requests(&self) -> Vec<ChargeRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of distinct purchase intents that got an answer.
    pub fn answered(&self) -> usize {
        self.outcomes.len()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome> {
        self.requests.lock().await.push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .outcomes
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| match &self.decline_reason {
                Some(reason) => ChargeOutcome::Declined {
                    reason: reason.clone(),
                },
                None if request.method.settles_at_checkout() => ChargeOutcome::Approved {
                    transaction_id: Some(format!("txn_{}", Uuid::new_v4().simple())),
                    settled: true,
                },
                None => ChargeOutcome::Approved {
                    transaction_id: None,
                    settled: false,
                },
            })
            .value()
            .clone();

        debug!(
            reference = %request.reference,
            amount = %request.amount,
            method = %request.method,
            ?outcome,
            "charge answered"
        );
        Ok(outcome)
    }
}
