use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weft_api::cache::ArtifactCache;
use weft_api::config::GatewayConfig;
use weft_api::files::FileGateway;
use weft_api::router::build_app_router;
use weft_api::state::AppState;
use weft_api::{notifications, ws};

use weft_executor::registry::{NodeDescriptor, NodeRegistry, NodeSource, SourceError};
use weft_executor::QueueExecutor;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weft_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = GatewayConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded gateway configuration");

    // --- Managed directories ---
    let files = Arc::new(FileGateway::new(&config));
    files
        .ensure_dirs()
        .await
        .expect("Failed to create managed directories");
    let cache = Arc::new(ArtifactCache::new(config.cache_dir.clone()));
    tokio::fs::create_dir_all(cache.dir())
        .await
        .expect("Failed to create cache directory");
    tracing::info!(cache_dir = %cache.dir().display(), "Managed directories ready");

    // --- Node registry + executor queue ---
    let registry = Arc::new(NodeRegistry::load(&node_sources()));
    tracing::info!(nodes = registry.len(), "Node registry built");
    let executor = Arc::new(QueueExecutor::new(Arc::clone(&registry)));

    // --- Session registry + heartbeat ---
    let sessions = Arc::new(ws::SessionRegistry::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&sessions));

    // --- Event dispatch loop ---
    let (events, event_rx) = notifications::event_channel();
    let view = Arc::new(RwLock::new(notifications::ExecutionView::default()));
    let dispatch_cancel = tokio_util::sync::CancellationToken::new();
    let dispatch_handle = tokio::spawn(notifications::run_dispatch_loop(
        event_rx,
        Arc::clone(&sessions),
        Arc::clone(&view),
        dispatch_cancel.clone(),
    ));
    tracing::info!("Event dispatch loop started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        executor,
        sessions: Arc::clone(&sessions),
        events,
        view,
        cache,
        files,
        counter: Arc::new(AtomicU64::new(0)),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Gateway stopped accepting connections, cleaning up");

    dispatch_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), dispatch_handle).await;
    tracing::info!("Event dispatch loop stopped");

    let session_count = sessions.connection_count().await;
    tracing::info!(session_count, "Closing remaining WebSocket sessions");
    sessions.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the gateway
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Ordered node-source list for the registry build: base vocabulary
/// first so later sources cannot shadow it.
fn node_sources() -> Vec<Box<dyn NodeSource>> {
    vec![Box::new(BaseNodes)]
}

/// The gateway's built-in node vocabulary: the IO node types every
/// attached runner understands. Runner-specific sources register after
/// this one.
struct BaseNodes;

impl NodeSource for BaseNodes {
    fn name(&self) -> &str {
        "base"
    }

    fn descriptors(&self) -> Result<Vec<NodeDescriptor>, SourceError> {
        let io = |name: &str, inputs: &[&str], outputs: &[&str], output_node: bool| {
            NodeDescriptor {
                name: name.to_string(),
                display_name: name.to_string(),
                category: "image".to_string(),
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                outputs: outputs.iter().map(|s| s.to_string()).collect(),
                output_node,
            }
        };

        Ok(vec![
            io("LoadImage", &["image"], &["IMAGE", "MASK"], false),
            io("SaveImage", &["images", "filename_prefix"], &[], true),
            io("PreviewImage", &["images"], &[], true),
        ])
    }
}
