mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zamc_connectors_core::{
    load_config_from_env, validate_config, ApprovalListener, BusBackend, Config,
    DeploymentOrchestrator, EventBus, LoggingConfig, MemoryBus, NatsBus, OrchestratorMetrics,
    PlatformRegistry, Subjects,
};

use api::create_router;
use metrics::register_orchestrator_metrics;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Logging settings live in the config, so a load failure is reported
    // through a default subscriber.
    let config = match load_config_from_env() {
        Ok(config) => {
            init_logging(&config.logging);
            config
        }
        Err(e) => {
            init_logging(&LoggingConfig::default());
            return Err(e).context("Failed to load configuration");
        }
    };

    validate_config(&config).context("Configuration validation failed")?;

    info!(
        environment = %config.environment,
        bus = config.bus.backend.as_str(),
        platforms = config.platforms.len(),
        "Configuration loaded successfully"
    );

    let bus = connect_bus(&config).await?;
    info!(backend = bus.name(), "Event bus connected");

    let registry =
        PlatformRegistry::from_config(&config.platforms).context("Failed to build platforms")?;
    for platform in registry.platforms() {
        info!(platform = %platform, "Registered ad platform");
    }

    let metrics = OrchestratorMetrics::new().context("Failed to create metrics")?;
    register_orchestrator_metrics(&metrics).context("Failed to register metrics")?;

    let subjects = Subjects::from_config(&config.bus);
    let orchestrator = Arc::new(DeploymentOrchestrator::new(
        config.deployment.clone(),
        registry,
        Arc::clone(&bus),
        subjects.clone(),
        metrics,
    ));

    let subscription = bus
        .queue_subscribe(&subjects.approvals, &config.bus.queue_group)
        .await
        .context("Failed to subscribe to approval events")?;

    let cancel = CancellationToken::new();
    let listener = ApprovalListener::new(Arc::clone(&orchestrator), &config.consumer);
    let listener_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { listener.run(subscription, cancel).await })
    };

    let state = Arc::new(AppState::new(config.clone(), orchestrator));
    state.set_ready(true);

    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let tcp_listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Drain the listener before the HTTP server stops so health stays
    // observable while in-flight deployments settle.
    let shutdown = {
        let state = Arc::clone(&state);
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, draining approval listener");
            state.set_ready(false);
            cancel.cancel();
            if let Err(e) = listener_handle.await {
                error!(error = %e, "Approval listener task failed");
            }
            info!("Approval listener stopped");
        }
    };

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    bus.close().await.context("Failed to close event bus")?;
    info!("Event bus closed");

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=debug", logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_bus(config: &Config) -> Result<Arc<dyn EventBus>> {
    let bus: Arc<dyn EventBus> = match config.bus.backend {
        BusBackend::Nats => {
            info!("Connecting to NATS");
            Arc::new(
                NatsBus::connect(&config.bus.url)
                    .await
                    .context("Failed to connect to NATS")?
                    .with_subscription_buffer(config.consumer.max_in_flight),
            )
        }
        BusBackend::Memory => {
            info!("Using in-process memory bus");
            Arc::new(MemoryBus::with_limits(
                config.bus.max_deliveries,
                config.consumer.max_in_flight,
            ))
        }
    };
    Ok(bus)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
