use anyhow::Context;
use rental::account::repository::{
    AccountRepository, InMemoryAccountRepository, PostgresAccountRepository,
};
use rental::listing::repository::{
    InMemoryListingRepository, ListingRepository, PostgresListingRepository,
};
use rental::tasks::{InMemoryTaskQueue, RedisTaskQueue, TaskMux, TaskQueue, TaskWorker};
use rental::{build_router, AppConfig, AppState, LogEmailSender, SystemClock, TokenIssuer};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before anything reads the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rental=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rental listing server");

    let config = Arc::new(AppConfig::from_env()?);
    let clock = Arc::new(SystemClock::new());
    let token_issuer = Arc::new(TokenIssuer::new(&config.secret_key, clock.clone())?);

    let (account_repository, listing_repository): (
        Arc<dyn AccountRepository + Send + Sync>,
        Arc<dyn ListingRepository + Send + Sync>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("failed to connect to database")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            info!("Using PostgreSQL repositories");
            (
                Arc::new(PostgresAccountRepository::new(pool.clone())),
                Arc::new(PostgresListingRepository::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, accounts and listings are kept in memory");
            (
                Arc::new(InMemoryAccountRepository::new()),
                Arc::new(InMemoryListingRepository::new()),
            )
        }
    };

    let task_queue: Arc<dyn TaskQueue + Send + Sync> = match &config.redis_url {
        Some(url) => {
            info!(queue = %config.worker.queue, "Using Redis task queue");
            Arc::new(RedisTaskQueue::connect(url, config.worker.queue.clone()).await?)
        }
        None => {
            warn!("REDIS_URL not set, tasks are queued in memory");
            Arc::new(InMemoryTaskQueue::new(config.worker.queue.clone()))
        }
    };

    // Background email worker on the same queue the handlers enqueue to
    let email_sender = Arc::new(LogEmailSender::new(&config.mail));
    let worker = TaskWorker::new(
        task_queue.clone(),
        Arc::new(TaskMux::with_email_handlers(email_sender)),
        config.worker.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app_state = AppState::new(
        config.clone(),
        clock,
        token_issuer,
        account_repository,
        listing_repository,
        task_queue,
    );
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("HTTP server stopped, waiting for task worker");
    let _ = shutdown_tx.send(true);
    worker_handle.await.context("task worker panicked")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
