use axum::routing::{get, post};
use axum::Router;
use payment_router::config::AppConfig;
use payment_router::decider::Decider;
use payment_router::processors::http::HttpProcessorClient;
use payment_router::processors::ProcessorClient;
use payment_router::repo::payments_repo::PaymentsRepo;
use payment_router::service::dispatcher::Dispatcher;
use payment_router::service::health_monitor::HealthMonitor;
use payment_router::service::reconciler::Reconciler;
use payment_router::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let payments_repo = PaymentsRepo { pool: pool.clone() };
    let client: Arc<dyn ProcessorClient> = Arc::new(HttpProcessorClient::new(
        cfg.default_url.clone(),
        cfg.fallback_url.clone(),
    ));
    let decider = Arc::new(Decider::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(
        Dispatcher {
            repo: payments_repo.clone(),
            client: client.clone(),
            decider: decider.clone(),
        }
        .run(shutdown_rx.clone()),
    );
    let reconciler = tokio::spawn(
        Reconciler {
            repo: payments_repo.clone(),
            client: client.clone(),
        }
        .run(shutdown_rx.clone()),
    );
    let health_monitor = tokio::spawn(
        HealthMonitor {
            repo: payments_repo.clone(),
            client,
            decider,
        }
        .run(shutdown_rx),
    );

    let state = AppState { payments_repo };

    let app = Router::new()
        .route("/payments", post(payment_router::http::handlers::payments::create_payment))
        .route(
            "/payments-summary",
            get(payment_router::http::handlers::payments::payments_summary),
        )
        .route("/health", get(payment_router::http::handlers::payments::health))
        .route("/ready", get(payment_router::http::handlers::payments::ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!(instance_id = %cfg.instance_id, "listening on {}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(dispatcher, reconciler, health_monitor);
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
