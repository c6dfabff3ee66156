use crate::domain::payment::Provider;
use crate::processors::{HealthReport, ProcessorClient};
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

pub const PAY_TIMEOUT: Duration = Duration::from_millis(350);
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(450);
pub const HEALTH_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayRequest {
    correlation_id: Uuid,
    amount: Decimal,
    requested_at: DateTime<Utc>,
}

pub struct HttpProcessorClient {
    pub default_url: String,
    pub fallback_url: String,
    pub client: reqwest::Client,
}

impl HttpProcessorClient {
    pub fn new(default_url: String, fallback_url: String) -> Self {
        Self {
            default_url,
            fallback_url,
            client: reqwest::Client::new(),
        }
    }

    fn base(&self, provider: Provider) -> &str {
        match provider {
            Provider::Default => &self.default_url,
            Provider::Fallback => &self.fallback_url,
        }
    }
}

#[async_trait::async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn pay(
        &self,
        provider: Provider,
        correlation_id: Uuid,
        amount: Decimal,
        requested_at: DateTime<Utc>,
    ) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/payments", self.base(provider)))
            .json(&PayRequest {
                correlation_id,
                amount,
                requested_at,
            })
            .timeout(PAY_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("processor status: {}", resp.status().as_u16());
        }
        Ok(())
    }

    async fn probe(&self, provider: Provider, correlation_id: Uuid) -> bool {
        let resp = self
            .client
            .get(format!("{}/payments/{}", self.base(provider), correlation_id))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        matches!(resp, Ok(r) if r.status() == StatusCode::OK)
    }

    async fn health(&self, provider: Provider) -> Result<HealthReport> {
        let resp = self
            .client
            .get(format!("{}/payments/service-health", self.base(provider)))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("health status: {}", resp.status().as_u16());
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pay_request_uses_processor_field_names() {
        let v = serde_json::to_value(PayRequest {
            correlation_id: Uuid::nil(),
            amount: dec!(10.5),
            requested_at: "2025-07-01T12:00:00Z".parse().unwrap(),
        })
        .unwrap();

        assert_eq!(
            v["correlationId"],
            serde_json::json!("00000000-0000-0000-0000-000000000000")
        );
        assert_eq!(v["amount"].to_string(), "10.5");
        assert_eq!(v["requestedAt"], serde_json::json!("2025-07-01T12:00:00Z"));
    }

    #[test]
    fn health_report_decodes_service_health_payload() {
        let report: HealthReport =
            serde_json::from_str(r#"{"failing":true,"minResponseTime":120}"#).unwrap();
        assert!(report.failing);
        assert_eq!(report.min_response_ms, 120);
    }
}
