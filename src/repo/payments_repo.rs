use crate::domain::payment::{PaymentStatus, Provider};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentsRepo {
    pub pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct ClaimedPayment {
    pub correlation_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct InFlightPayment {
    pub correlation_id: Uuid,
    pub provider: Provider,
    pub requested_at: DateTime<Utc>,
}

impl PaymentsRepo {
    // Returns true when a record with this correlation id already existed.
    pub async fn ensure_unique(&self, correlation_id: Uuid, amount: Decimal) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO payments (correlation_id, amount, provider, status, requested_at)
            VALUES ($1, $2, 'default', 'PENDING', now())
            ON CONFLICT (correlation_id) DO NOTHING
            RETURNING 1
            "#,
        )
        .bind(correlation_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inserted.is_none())
    }

    // Single-statement select-and-transition; SKIP LOCKED keeps replicas from
    // claiming the same rows or waiting on each other.
    pub async fn claim_pending_batch(&self, limit: i64) -> Result<Vec<ClaimedPayment>> {
        let rows = sqlx::query(
            r#"
            WITH claimed AS (
                SELECT correlation_id
                FROM payments
                WHERE status = 'PENDING'
                ORDER BY requested_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE payments p
            SET status = 'DISPATCHING'
            FROM claimed
            WHERE p.correlation_id = claimed.correlation_id
            RETURNING p.correlation_id, p.amount
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ClaimedPayment {
                correlation_id: r.get("correlation_id"),
                amount: r.get("amount"),
            })
            .collect())
    }

    pub async fn finish(
        &self,
        correlation_id: Uuid,
        provider: Provider,
        status: PaymentStatus,
        requested_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE payments SET provider = $2, status = $3, requested_at = $4 WHERE correlation_id = $1",
        )
        .bind(correlation_id)
        .bind(provider.as_str())
        .bind(status.as_str())
        .bind(requested_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_in_flight_with_time(&self, limit: i64) -> Result<Vec<InFlightPayment>> {
        let rows = sqlx::query(
            r#"
            SELECT correlation_id, provider, requested_at
            FROM payments
            WHERE status IN ('PENDING', 'DISPATCHING')
            ORDER BY requested_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| InFlightPayment {
                correlation_id: r.get("correlation_id"),
                provider: provider_from_str(r.get("provider")),
                requested_at: r.get("requested_at"),
            })
            .collect())
    }

    pub async fn mark_processed(&self, correlation_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE payments SET status = 'PROCESSED' WHERE correlation_id = $1")
            .bind(correlation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, correlation_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE payments SET status = 'FAILED' WHERE correlation_id = $1")
            .bind(correlation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn summary(
        &self,
        provider: Provider,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<(i64, Decimal)> {
        let row = sqlx::query(
            r#"
            SELECT count(*) AS total_requests, COALESCE(sum(amount), 0) AS total_amount
            FROM payments
            WHERE provider = $1
              AND status = 'PROCESSED'
              AND ($2::timestamptz IS NULL OR requested_at >= $2)
              AND ($3::timestamptz IS NULL OR requested_at <= $3)
            "#,
        )
        .bind(provider.as_str())
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("total_requests"), row.get("total_amount")))
    }

    // Advisory locks are session-scoped: the guard holds the checked-out
    // connection until it unlocks on that same connection.
    pub async fn try_global_lock(&self, key: i64) -> Result<Option<GlobalLock>> {
        let mut conn = self.pool.acquire().await?;
        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn.as_mut())
            .await?;

        Ok(if locked {
            Some(GlobalLock {
                conn: Some(conn),
                key,
            })
        } else {
            None
        })
    }
}

pub struct GlobalLock {
    conn: Option<PoolConnection<Postgres>>,
    key: i64,
}

impl GlobalLock {
    pub async fn release(mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        match sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(conn.as_mut())
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                // the session still holds the lock; close the connection so
                // the lock dies with it instead of going back to the pool
                drop(conn.detach());
                Err(err.into())
            }
        }
    }
}

impl Drop for GlobalLock {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn.detach());
        }
    }
}

fn provider_from_str(s: &str) -> Provider {
    match s {
        "fallback" => Provider::Fallback,
        _ => Provider::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_column_round_trips() {
        assert_eq!(provider_from_str("default"), Provider::Default);
        assert_eq!(provider_from_str("fallback"), Provider::Fallback);
        assert_eq!(provider_from_str(Provider::Fallback.as_str()), Provider::Fallback);
    }
}
