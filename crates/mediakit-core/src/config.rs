//! Configuration module
//!
//! Provides the application configuration loaded once at process start,
//! including the storage root resolution used by the storage gateway.

use std::env;
use std::path::{Path, PathBuf};

// Defaults
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_WORKER_POOL_SIZE: usize = 4;
const DEFAULT_JOB_QUEUE_SIZE: usize = 1000;
const DEFAULT_WEBHOOK_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Conventional mount point for a persistent volume in container deployments.
const MOUNTED_STORAGE_PATH: &str = "/var/lib/mediakit/storage";
/// Fallback storage directory relative to the working directory.
const FALLBACK_STORAGE_PATH: &str = "storage";

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    /// API key required on every protected route.
    pub api_key: String,
    /// Base URL used only to compose externally addressable download URLs.
    pub api_base_url: String,
    /// Resolved storage root; all artifacts live under this directory.
    pub storage_path: PathBuf,
    pub worker_pool_size: usize,
    pub job_queue_size: usize,
    pub webhook_max_attempts: u32,
    pub webhook_timeout_seconds: u64,
    pub ffmpeg_path: String,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // Load .env if present; real environment wins
        dotenvy::dotenv().ok();

        let api_key = env::var("API_KEY")
            .map_err(|_| anyhow::anyhow!("API_KEY environment variable is required"))?;

        let config = Self {
            server_port: env_parse("SERVER_PORT", DEFAULT_SERVER_PORT),
            api_key,
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            storage_path: resolve_storage_root(env::var("STORAGE_PATH").ok().as_deref()),
            worker_pool_size: env_parse("WORKER_POOL_SIZE", DEFAULT_WORKER_POOL_SIZE),
            job_queue_size: env_parse("JOB_QUEUE_SIZE", DEFAULT_JOB_QUEUE_SIZE),
            webhook_max_attempts: env_parse("WEBHOOK_MAX_ATTEMPTS", DEFAULT_WEBHOOK_MAX_ATTEMPTS),
            webhook_timeout_seconds: env_parse("WEBHOOK_TIMEOUT_SECONDS", DEFAULT_WEBHOOK_TIMEOUT_SECS),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("API_KEY must not be empty");
        }
        if self.worker_pool_size == 0 {
            anyhow::bail!("WORKER_POOL_SIZE must be at least 1");
        }
        if self.job_queue_size == 0 {
            anyhow::bail!("JOB_QUEUE_SIZE must be at least 1");
        }
        if self.webhook_max_attempts == 0 {
            anyhow::bail!("WEBHOOK_MAX_ATTEMPTS must be at least 1");
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            anyhow::bail!("API_BASE_URL must be an absolute http(s) URL");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Compose the externally addressable download URL for a stored filename.
    pub fn download_url(&self, filename: &str) -> String {
        format!(
            "{}/v1/storage/download/{}",
            self.api_base_url.trim_end_matches('/'),
            filename
        )
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

/// Resolve the storage root once at process start.
///
/// Precedence: explicit override, then the mounted-volume convention path when
/// it exists and is writable, then the built-in fallback next to the process.
pub fn resolve_storage_root(override_path: Option<&str>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }

    let mounted = Path::new(MOUNTED_STORAGE_PATH);
    if mounted.is_dir() && dir_is_writable(mounted) {
        return mounted.to_path_buf();
    }

    PathBuf::from(FALLBACK_STORAGE_PATH)
}

fn dir_is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}
