//! Shared test harness: builds the full application router over a
//! temporary directory tree, with the in-process queue executor and a
//! runner task standing in for the external graph engine.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::RwLock;
use uuid::Uuid;

use weft_api::cache::ArtifactCache;
use weft_api::config::GatewayConfig;
use weft_api::files::FileGateway;
use weft_api::notifications;
use weft_api::router::build_app_router;
use weft_api::state::AppState;
use weft_api::ws::SessionRegistry;

use weft_executor::queue::ClaimedJob;
use weft_executor::registry::{NodeDescriptor, NodeRegistry};
use weft_executor::{
    Executor, ExecutionFailure, OutputMap, QueueEntry, QueueExecutor, QueueSnapshot,
    ValidationOutcome,
};

/// Everything a test needs to drive the gateway end to end.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    /// The concrete queue, for driving jobs like an external runner.
    pub queue: Arc<QueueExecutor>,
    /// Enqueue count observed through the executor seam.
    pub enqueues: Arc<AtomicUsize>,
    /// Root of the managed directory tree; dropped with the test.
    pub tmp: tempfile::TempDir,
}

/// Build a test `GatewayConfig` rooted in `dir` with safe defaults.
pub fn test_config(dir: &Path, queue_busy_threshold: usize) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        queue_busy_threshold,
        cache_dir: dir.join("cache"),
        input_dir: dir.join("input"),
        output_dir: dir.join("output"),
        temp_dir: dir.join("temp"),
    }
}

/// Registry with the IO vocabulary the tests submit against.
pub fn test_registry() -> Arc<NodeRegistry> {
    let mut registry = NodeRegistry::new();
    let io = |name: &str, output_node: bool| NodeDescriptor {
        name: name.to_string(),
        display_name: name.to_string(),
        category: "image".to_string(),
        inputs: vec![],
        outputs: vec![],
        output_node,
    };
    registry.register(io("LoadImage", false));
    registry.register(io("SaveImage", true));
    registry.register(io("PreviewImage", true));
    Arc::new(registry)
}

/// Build the full application with all middleware, mirroring `main.rs`.
pub async fn build_test_app(queue_busy_threshold: usize) -> TestApp {
    let tmp = tempfile::tempdir().expect("create temp root");
    let config = test_config(tmp.path(), queue_busy_threshold);

    let files = Arc::new(FileGateway::new(&config));
    files.ensure_dirs().await.expect("create managed dirs");
    let cache = Arc::new(ArtifactCache::new(config.cache_dir.clone()));
    tokio::fs::create_dir_all(cache.dir())
        .await
        .expect("create cache dir");

    let queue = Arc::new(QueueExecutor::new(test_registry()));
    let enqueues = Arc::new(AtomicUsize::new(0));
    let executor: Arc<dyn Executor> = Arc::new(CountingExecutor {
        inner: Arc::clone(&queue),
        enqueues: Arc::clone(&enqueues),
    });

    let sessions = Arc::new(SessionRegistry::new());
    let (events, event_rx) = notifications::event_channel();
    let view = Arc::new(RwLock::new(notifications::ExecutionView::default()));
    let cancel = tokio_util::sync::CancellationToken::new();
    tokio::spawn(notifications::run_dispatch_loop(
        event_rx,
        Arc::clone(&sessions),
        Arc::clone(&view),
        cancel,
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        executor,
        sessions,
        events,
        view,
        cache,
        files,
        counter: Arc::new(AtomicU64::new(0)),
    };

    let app = build_app_router(state.clone(), &config);

    TestApp {
        app,
        state,
        queue,
        enqueues,
        tmp,
    }
}

/// A valid two-node graph against [`test_registry`].
pub fn valid_prompt() -> serde_json::Value {
    serde_json::json!({
        "1": {"class_type": "LoadImage", "inputs": {"image": "in.png"}},
        "2": {"class_type": "SaveImage", "inputs": {"images": ["1", 0]}},
    })
}

/// Output map reporting one produced image in the output root.
pub fn outputs_with_image(filename: &str) -> OutputMap {
    let mut outputs = OutputMap::new();
    outputs.insert(
        "2".to_string(),
        serde_json::json!({
            "images": [{"filename": filename, "subfolder": "", "type": "output"}],
        }),
    );
    outputs
}

/// Write a small RGB PNG into the managed output root.
pub fn write_output_png(tmp: &Path, filename: &str) -> std::path::PathBuf {
    let path = tmp.join("output").join(filename);
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 80, 120]));
    img.save(&path).expect("write fixture png");
    path
}

/// Stand-in for the external runner: claims jobs as they appear and
/// finishes each with `result`.
pub fn spawn_runner<F>(queue: Arc<QueueExecutor>, result: F) -> tokio::task::JoinHandle<()>
where
    F: Fn(&ClaimedJob) -> Result<OutputMap, ExecutionFailure> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match queue.take_next().await {
                Some(job) => {
                    let outcome = result(&job);
                    queue.finish(job.job_id, outcome).await;
                }
                None => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    })
}

/// Execution failure fixture.
pub fn failure(message: &str) -> ExecutionFailure {
    ExecutionFailure {
        node_id: Some("2".to_string()),
        kind: "RuntimeError".to_string(),
        message: message.to_string(),
    }
}

/// Delegating executor that counts enqueues, so tests can assert a
/// cache hit never re-enqueues.
struct CountingExecutor {
    inner: Arc<QueueExecutor>,
    enqueues: Arc<AtomicUsize>,
}

#[async_trait]
impl Executor for CountingExecutor {
    async fn enqueue(&self, entry: QueueEntry) {
        self.enqueues.fetch_add(1, Ordering::SeqCst);
        self.inner.enqueue(entry).await;
    }

    async fn current_queue(&self) -> (Vec<QueueSnapshot>, Vec<QueueSnapshot>) {
        self.inner.current_queue().await
    }

    async fn history(&self, job_id: Option<Uuid>) -> serde_json::Value {
        self.inner.history(job_id).await
    }

    async fn tasks_remaining(&self) -> usize {
        self.inner.tasks_remaining().await
    }

    async fn clear_queue(&self) {
        self.inner.clear_queue().await;
    }

    async fn clear_history(&self) {
        self.inner.clear_history().await;
    }

    async fn delete_queue_item(&self, job_id: Uuid) -> bool {
        self.inner.delete_queue_item(job_id).await
    }

    async fn delete_history_item(&self, job_id: Uuid) {
        self.inner.delete_history_item(job_id).await;
    }

    async fn validate(&self, payload: &serde_json::Value) -> ValidationOutcome {
        self.inner.validate(payload).await
    }
}
