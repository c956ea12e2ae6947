use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.trim().parse().ok())
}

fn available_threads() -> i64 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i64)
        .unwrap_or(4)
}

fn default_threads() -> i64 { available_threads() }
fn default_harvest_poll_ms() -> u64 { 100 }
fn default_root_dir() -> PathBuf { PathBuf::from(".") }

/// Scheduler configuration.
///
/// Every field has an env counterpart (`PBUILD_*`); CLI flags override it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Requested degree of concurrency. Values below 1 are clamped to 1 when
    /// the pool is sized.
    #[serde(default = "default_threads")]
    pub threads: i64,
    /// How often a blocked harvest re-checks the interrupt signal.
    #[serde(default = "default_harvest_poll_ms")]
    pub harvest_poll_ms: u64,
    /// Execution root; the priority file is resolved against it.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Explicit priority file, replacing the well-known location.
    #[serde(default)]
    pub priority_file: Option<PathBuf>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            harvest_poll_ms: default_harvest_poll_ms(),
            root_dir: default_root_dir(),
            priority_file: None,
        }
    }
}

impl BuilderConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            threads: env_parse("PBUILD_THREADS").unwrap_or_else(default_threads),
            harvest_poll_ms: env_parse("PBUILD_HARVEST_POLL_MS")
                .unwrap_or_else(default_harvest_poll_ms),
            root_dir: PathBuf::from(env_or("PBUILD_ROOT", ".")),
            priority_file: env_opt("PBUILD_PRIORITY_FILE").map(PathBuf::from),
        }
    }

    pub fn with_threads(mut self, threads: i64) -> Self {
        self.threads = threads;
        self
    }

    pub fn harvest_poll(&self) -> Duration {
        Duration::from_millis(self.harvest_poll_ms.max(1))
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  threads:       {}", self.threads);
        tracing::info!("  harvest_poll:  {}ms", self.harvest_poll_ms);
        tracing::info!("  root_dir:      {}", self.root_dir.display());
        tracing::info!(
            "  priority_file: {}",
            self.priority_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default location)".to_string())
        );
    }
}
