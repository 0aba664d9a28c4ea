//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use saga::{Backends, BrokerConnector, FulfillmentPlatform, PlatformConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Picks the storage for the inventory and order services.
async fn backends(config: &Config) -> Result<Backends, BoxError> {
    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;

        let inventory = inventory::PostgresInventoryRepository::new(pool.clone());
        inventory.run_migrations().await?;
        inventory
            .seed(
                &inventory::seed::categories(),
                &inventory::seed::products(),
                &inventory::seed::stocks(),
            )
            .await?;
        let orders = orders::PostgresOrderRepository::new(pool);
        orders.run_migrations().await?;

        info!("using PostgreSQL storage");
        return Ok(Backends {
            inventory: Arc::new(inventory),
            orders: Arc::new(orders),
            ..Backends::in_memory()
        });
    }

    #[cfg(not(feature = "postgres"))]
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
    }

    info!("using in-memory storage");
    Ok(Backends::in_memory())
}

async fn serve<B: BrokerConnector>(
    connector: B,
    config: Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    let backends = backends(&config).await?;
    let platform = FulfillmentPlatform::start(&connector, backends, PlatformConfig::from_env())?;
    let app = api::create_app(Arc::new(AppState::from_platform(&platform)), metrics_handle);

    info!(%addr, "starting API server");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Consumers and publishers are drained even when the server failed.
    let stopped = platform.shutdown().await;
    served?;
    stopped?;

    info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    #[cfg(feature = "kafka")]
    let connector = saga::KafkaConnector::new(messaging::MessagingConfig::from_env());
    #[cfg(not(feature = "kafka"))]
    let connector = messaging::InMemoryBroker::new();

    serve(connector, config, metrics_handle).await
}
