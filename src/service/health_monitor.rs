use crate::decider::Decider;
use crate::domain::payment::Provider;
use crate::processors::ProcessorClient;
use crate::repo::payments_repo::PaymentsRepo;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const TICK: Duration = Duration::from_secs(5);
const HEALTH_LOCK_KEY: i64 = 987_654_321;

pub struct HealthMonitor {
    pub repo: PaymentsRepo,
    pub client: Arc<dyn ProcessorClient>,
    pub decider: Arc<Decider>,
}

impl HealthMonitor {
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("health monitor started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(TICK) => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "health tick failed");
                    }
                }
            }
        }
        tracing::info!("health monitor stopped");
    }

    // One replica polls at a time; losing the lock just means another
    // replica took this round.
    async fn tick(&self) -> Result<()> {
        let Some(lock) = self.repo.try_global_lock(HEALTH_LOCK_KEY).await? else {
            return Ok(());
        };

        self.refresh(Provider::Default).await;
        self.refresh(Provider::Fallback).await;

        lock.release().await
    }

    async fn refresh(&self, provider: Provider) {
        match self.client.health(provider).await {
            Ok(report) => {
                self.decider
                    .update_health(provider, report.failing, report.min_response_ms);
            }
            Err(err) => {
                tracing::debug!(
                    provider = provider.as_str(),
                    error = %err,
                    "health probe failed"
                );
            }
        }
    }
}
