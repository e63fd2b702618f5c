use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_cloud::config::{ProviderSettings, StorageSettings, VisionSettings};
use atelier_core::ports::{JobStore, PromptBuilder, SubjectCatalog};
use atelier_core::preview::JobKind;
use atelier_core::prompt::TemplatePromptBuilder;
use atelier_db::{PgJobStore, PgSubjectCatalog};
use atelier_pipeline::{PreviewWorker, PromptResolver, WorkerConfig};

/// How long to wait for each loop to finish its in-flight job on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "atelier_worker=debug,atelier_pipeline=debug,atelier_cloud=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        batch_size = config.batch_size,
        job_timeout_secs = config.job_timeout.as_secs(),
        stuck_threshold_secs = config.stuck_threshold.as_secs(),
        "Loaded worker configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = atelier_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    atelier_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    atelier_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Ports ---
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let catalog: Arc<dyn SubjectCatalog> = Arc::new(PgSubjectCatalog::new(pool));
    let builder: Arc<dyn PromptBuilder> = Arc::new(TemplatePromptBuilder::default());

    // --- Providers ---
    let storage = StorageSettings::from_env().build().await;
    let provider = ProviderSettings::from_env().build(storage);
    let analyzer = Arc::new(VisionSettings::from_env().build());

    // --- Loops ---
    let preview_worker = PreviewWorker::new(
        "preview",
        JobKind::PREVIEW,
        Arc::clone(&store),
        PromptResolver::new(Arc::clone(&catalog), Arc::clone(&builder)),
        Arc::clone(&provider),
        config.clone(),
    );
    let upgrade_worker = PreviewWorker::new(
        "upgrade",
        JobKind::UPGRADE,
        store,
        PromptResolver::new(catalog, builder).with_analyzer(analyzer),
        provider,
        config,
    );

    let cancel = CancellationToken::new();
    let preview_handle = tokio::spawn({
        let cancel = cancel.child_token();
        async move { preview_worker.run(cancel).await }
    });
    let upgrade_handle = tokio::spawn({
        let cancel = cancel.child_token();
        async move { upgrade_worker.run(cancel).await }
    });
    tracing::info!("Worker loops started");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    for (name, handle) in [("preview", preview_handle), ("upgrade", upgrade_handle)] {
        match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
            Ok(Ok(())) => tracing::info!(worker = name, "Worker loop stopped"),
            Ok(Err(e)) => tracing::error!(worker = name, error = %e, "Worker loop panicked"),
            Err(_) => tracing::warn!(worker = name, "Worker loop did not stop in time"),
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping worker loops");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping worker loops");
        }
    }
}
