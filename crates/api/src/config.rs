use std::path::PathBuf;

/// Gateway configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8188`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Queue-depth ceiling for the synchronous submission API. Depths
    /// above this reject with a too-busy outcome.
    pub queue_busy_threshold: usize,
    /// Directory holding cache entries, one file (or link) per digest.
    pub cache_dir: PathBuf,
    /// Managed root for uploaded inputs.
    pub input_dir: PathBuf,
    /// Managed root for produced outputs.
    pub output_dir: PathBuf,
    /// Managed root for temporary files.
    pub temp_dir: PathBuf,
}

impl GatewayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8188`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `QUEUE_BUSY_THRESHOLD` | `100`                      |
    /// | `CACHE_DIR`            | `./data/cache`             |
    /// | `INPUT_DIR`            | `./files/input`            |
    /// | `OUTPUT_DIR`           | `./files/output`           |
    /// | `TEMP_DIR`             | `./files/temp`             |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8188".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let queue_busy_threshold: usize = std::env::var("QUEUE_BUSY_THRESHOLD")
            .unwrap_or_else(|_| "100".into())
            .parse()
            .expect("QUEUE_BUSY_THRESHOLD must be a valid usize");

        let dir = |var: &str, default: &str| {
            PathBuf::from(std::env::var(var).unwrap_or_else(|_| default.into()))
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            queue_busy_threshold,
            cache_dir: dir("CACHE_DIR", "./data/cache"),
            input_dir: dir("INPUT_DIR", "./files/input"),
            output_dir: dir("OUTPUT_DIR", "./files/output"),
            temp_dir: dir("TEMP_DIR", "./files/temp"),
        }
    }
}
