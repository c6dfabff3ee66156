use crate::processors::ProcessorClient;
use crate::repo::payments_repo::PaymentsRepo;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const TICK: Duration = Duration::from_millis(25);
pub const MAX_PROBE_BATCH: i64 = 512;
pub const FAIL_AFTER: Duration = Duration::from_secs(5);

pub struct Reconciler {
    pub repo: PaymentsRepo,
    pub client: Arc<dyn ProcessorClient>,
}

impl Reconciler {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(max_probe_batch = MAX_PROBE_BATCH, "reconciler started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(TICK) => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "reconcile tick failed");
                    }
                }
            }
        }
        tracing::info!("reconciler stopped");
    }

    async fn tick(&self) -> Result<()> {
        let in_flight = self.repo.list_in_flight_with_time(MAX_PROBE_BATCH).await?;
        if in_flight.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        for payment in in_flight {
            if self
                .client
                .probe(payment.provider, payment.correlation_id)
                .await
            {
                if let Err(err) = self.repo.mark_processed(payment.correlation_id).await {
                    tracing::warn!(
                        correlation_id = %payment.correlation_id,
                        error = %err,
                        "mark processed failed"
                    );
                }
                continue;
            }

            if expired(now, payment.requested_at) {
                if let Err(err) = self.repo.mark_failed(payment.correlation_id).await {
                    tracing::warn!(
                        correlation_id = %payment.correlation_id,
                        error = %err,
                        "mark failed failed"
                    );
                } else {
                    tracing::info!(
                        correlation_id = %payment.correlation_id,
                        provider = payment.provider.as_str(),
                        "gave up on in-flight payment"
                    );
                }
            }
        }
        Ok(())
    }
}

pub fn expired(now: DateTime<Utc>, requested_at: DateTime<Utc>) -> bool {
    (now - requested_at)
        .to_std()
        .map(|age| age >= FAIL_AFTER)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn young_records_are_left_alone() {
        let now = Utc::now();
        assert!(!expired(now, now - chrono::Duration::seconds(4)));
        assert!(!expired(now, now));
    }

    #[test]
    fn old_records_age_out() {
        let now = Utc::now();
        assert!(expired(now, now - chrono::Duration::seconds(5)));
        assert!(expired(now, now - chrono::Duration::seconds(60)));
    }

    #[test]
    fn future_timestamps_never_age_out() {
        let now = Utc::now();
        assert!(!expired(now, now + chrono::Duration::seconds(10)));
    }
}
