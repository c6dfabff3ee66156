use crate::domain::payment::{PaymentRequest, Provider, ProviderSummary, SummaryResponse};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

pub async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<PaymentRequest>,
) -> impl IntoResponse {
    if let Err(message) = validate(&req) {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response();
    }

    match state
        .payments_repo
        .ensure_unique(req.correlation_id, req.amount)
        .await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"status": "OK", "idempotent": true})),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "QUEUED", "queuedAt": Utc::now()})),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(correlation_id = %req.correlation_id, error = %err, "enqueue failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "store unavailable"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub async fn payments_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let default = state
        .payments_repo
        .summary(Provider::Default, query.from, query.to)
        .await;
    let fallback = state
        .payments_repo
        .summary(Provider::Fallback, query.from, query.to)
        .await;

    match (default, fallback) {
        (Ok((default_count, default_amount)), Ok((fallback_count, fallback_amount))) => (
            StatusCode::OK,
            Json(SummaryResponse {
                default: ProviderSummary {
                    total_requests: default_count,
                    total_amount: default_amount,
                },
                fallback: ProviderSummary {
                    total_requests: fallback_count,
                    total_amount: fallback_amount,
                },
            }),
        )
            .into_response(),
        (Err(err), _) | (_, Err(err)) => {
            tracing::error!(error = %err, "summary query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "store unavailable"})),
            )
                .into_response()
        }
    }
}

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn ready() -> impl IntoResponse {
    StatusCode::OK
}

fn validate(req: &PaymentRequest) -> Result<(), &'static str> {
    if req.correlation_id.is_nil() {
        return Err("correlationId is required");
    }
    if req.amount <= Decimal::ZERO {
        return Err("amount must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn rejects_nil_correlation_id() {
        let req = PaymentRequest {
            correlation_id: Uuid::nil(),
            amount: dec!(10),
        };
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let zero = PaymentRequest {
            correlation_id: Uuid::new_v4(),
            amount: Decimal::ZERO,
        };
        let negative = PaymentRequest {
            correlation_id: Uuid::new_v4(),
            amount: dec!(-1.50),
        };
        assert!(validate(&zero).is_err());
        assert!(validate(&negative).is_err());
    }

    #[test]
    fn accepts_well_formed_requests() {
        let req = PaymentRequest {
            correlation_id: Uuid::new_v4(),
            amount: dec!(0.01),
        };
        assert!(validate(&req).is_ok());
    }
}
