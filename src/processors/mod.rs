use crate::domain::payment::Provider;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

pub mod http;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub failing: bool,
    #[serde(rename = "minResponseTime")]
    pub min_response_ms: u64,
}

#[async_trait::async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn pay(
        &self,
        provider: Provider,
        correlation_id: Uuid,
        amount: Decimal,
        requested_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn probe(&self, provider: Provider, correlation_id: Uuid) -> bool;

    async fn health(&self, provider: Provider) -> Result<HealthReport>;
}
