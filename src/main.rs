use medzone_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    payments::{MockPaymentService, PaymentState, StripePaymentClient},
    repository::{PostgresRepository, Repository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{process::ExitCode, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens the store, and serves HTTP until
/// a shutdown signal arrives. The pool is closed explicitly on the way out.
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet; this is the one place we write to stderr directly.
            eprintln!("FATAL: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(config.env);
    tracing::info!("Application starting in {:?} mode", config.env);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server terminated");
            ExitCode::FAILURE
        }
    }
}

/// Pretty output locally, JSON in production for log aggregation.
fn init_tracing(env: Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medzone_api=debug,tower_http=info,axum=info".into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let postgres = PostgresRepository::new(pool.clone());
    postgres.ping().await?;
    tracing::info!("Connected to Postgres and applied migrations");
    let repo = Arc::new(postgres) as RepositoryState;

    let payments = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripePaymentClient::new(&config.stripe_api_base, key)?) as PaymentState,
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set; using the mock payment processor");
            Arc::new(MockPaymentService::new()) as PaymentState
        }
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let app = create_router(AppState {
        repo,
        payments,
        config,
    });

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    pool.close().await;
    tracing::info!("Connection pool closed");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
