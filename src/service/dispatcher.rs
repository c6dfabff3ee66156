use crate::decider::Decider;
use crate::domain::payment::{PaymentStatus, Provider};
use crate::processors::ProcessorClient;
use crate::repo::payments_repo::{ClaimedPayment, PaymentsRepo};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

pub const TICK: Duration = Duration::from_millis(20);
pub const BATCH_SIZE: i64 = 64;
pub const RETRY_PROBE_DELAY: Duration = Duration::from_millis(150);

pub struct Dispatcher {
    pub repo: PaymentsRepo,
    pub client: Arc<dyn ProcessorClient>,
    pub decider: Arc<Decider>,
}

impl Dispatcher {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(batch_size = BATCH_SIZE, "dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(TICK) => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "dispatch tick failed");
                    }
                }
            }
        }
        tracing::info!("dispatcher stopped");
    }

    async fn tick(&self) -> Result<()> {
        let batch = self.repo.claim_pending_batch(BATCH_SIZE).await?;
        for payment in batch {
            let outcome = deliver(self.client.as_ref(), &self.decider, &payment).await;
            if let Err(err) = self
                .repo
                .finish(
                    payment.correlation_id,
                    outcome.provider,
                    outcome.status,
                    outcome.requested_at,
                )
                .await
            {
                // still DISPATCHING in the store; the reconciler resolves it
                tracing::warn!(
                    correlation_id = %payment.correlation_id,
                    error = %err,
                    "commit failed"
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub provider: Provider,
    pub status: PaymentStatus,
    pub requested_at: DateTime<Utc>,
}

pub async fn deliver(
    client: &dyn ProcessorClient,
    decider: &Decider,
    payment: &ClaimedPayment,
) -> DeliveryOutcome {
    let requested_at = Utc::now();
    let provider = decider.choose();

    let start = Instant::now();
    let result = client
        .pay(provider, payment.correlation_id, payment.amount, requested_at)
        .await;
    decider.observe(provider, start.elapsed(), result.is_ok());

    let status = match result {
        Ok(()) => PaymentStatus::Processed,
        Err(err) => {
            tracing::debug!(
                correlation_id = %payment.correlation_id,
                provider = provider.as_str(),
                error = %err,
                "pay attempt failed, confirming via probe"
            );
            confirm(client, provider, payment).await
        }
    };

    DeliveryOutcome {
        provider,
        status,
        requested_at,
    }
}

// The request may have succeeded even though the response was lost: probe
// immediately, then once more after a short delay, before giving the record
// back to the queue.
async fn confirm(
    client: &dyn ProcessorClient,
    provider: Provider,
    payment: &ClaimedPayment,
) -> PaymentStatus {
    if client.probe(provider, payment.correlation_id).await {
        return PaymentStatus::Processed;
    }

    tokio::time::sleep(RETRY_PROBE_DELAY).await;
    if client.probe(provider, payment.correlation_id).await {
        return PaymentStatus::Processed;
    }

    PaymentStatus::Pending
}
