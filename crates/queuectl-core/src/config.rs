//! Typed view over the `config` table, with the recognized keys and their
//! defaults.

use std::collections::HashMap;

use crate::store::Store;
use crate::error::Result;

/// A `(key, value)` pair as persisted. Both sides are strings; typed access
/// goes through [`RuntimeConfig`].
pub const DEFAULT_MAX_RETRIES: &str = "3";
pub const DEFAULT_BACKOFF_BASE: &str = "2";
pub const DEFAULT_POLL_INTERVAL_MS: &str = "500";
pub const DEFAULT_DB_PATH: &str = ".data/queuectl.db";
pub const DEFAULT_WORKER_HEARTBEAT_INTERVAL_SECONDS: &str = "5";
pub const DEFAULT_STALE_WORKER_TIMEOUT_SECONDS: &str = "30";
pub const DEFAULT_MAX_CONCURRENT_PROCESSES_PER_WORKER: &str = "1";

fn defaults() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("max_retries", DEFAULT_MAX_RETRIES),
        ("backoff_base", DEFAULT_BACKOFF_BASE),
        ("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS),
        ("db_path", DEFAULT_DB_PATH),
        (
            "worker_heartbeat_interval_seconds",
            DEFAULT_WORKER_HEARTBEAT_INTERVAL_SECONDS,
        ),
        (
            "stale_worker_timeout_seconds",
            DEFAULT_STALE_WORKER_TIMEOUT_SECONDS,
        ),
        (
            "max_concurrent_processes_per_worker",
            DEFAULT_MAX_CONCURRENT_PROCESSES_PER_WORKER,
        ),
    ])
}

/// Typed configuration resolved from the `config` table, falling back to the
/// recognized defaults for any key not present.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_retries: i64,
    pub backoff_base: i64,
    pub poll_interval_ms: u64,
    pub db_path: String,
    pub worker_heartbeat_interval_seconds: i64,
    pub stale_worker_timeout_seconds: i64,
    pub default_timeout_seconds: Option<i64>,
    pub log_dir: Option<String>,
    pub max_concurrent_processes_per_worker: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES.parse().unwrap(),
            backoff_base: DEFAULT_BACKOFF_BASE.parse().unwrap(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS.parse().unwrap(),
            db_path: DEFAULT_DB_PATH.to_string(),
            worker_heartbeat_interval_seconds: DEFAULT_WORKER_HEARTBEAT_INTERVAL_SECONDS
                .parse()
                .unwrap(),
            stale_worker_timeout_seconds: DEFAULT_STALE_WORKER_TIMEOUT_SECONDS.parse().unwrap(),
            default_timeout_seconds: None,
            log_dir: None,
            max_concurrent_processes_per_worker: DEFAULT_MAX_CONCURRENT_PROCESSES_PER_WORKER
                .parse()
                .unwrap(),
        }
    }
}

/// Reads and writes the `config` table.
pub struct ConfigManager<'a> {
    store: &'a Store,
}

impl<'a> ConfigManager<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.store.config_get(key).await? {
            return Ok(Some(value));
        }
        Ok(defaults().get(key).map(|v| v.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.config_set(key, value).await
    }

    pub async fn list_all(&self) -> Result<HashMap<String, String>> {
        let mut result: HashMap<String, String> = defaults()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in self.store.config_list().await? {
            result.insert(k, v);
        }
        Ok(result)
    }

    pub async fn runtime_config(&self) -> Result<RuntimeConfig> {
        let all = self.list_all().await?;
        let get_i64 = |k: &str, fallback: i64| -> i64 {
            all.get(k).and_then(|v| v.parse().ok()).unwrap_or(fallback)
        };
        let defaults = RuntimeConfig::default();
        Ok(RuntimeConfig {
            max_retries: get_i64("max_retries", defaults.max_retries),
            backoff_base: get_i64("backoff_base", defaults.backoff_base),
            poll_interval_ms: all
                .get("poll_interval_ms")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.poll_interval_ms),
            db_path: all
                .get("db_path")
                .cloned()
                .unwrap_or(defaults.db_path.clone()),
            worker_heartbeat_interval_seconds: get_i64(
                "worker_heartbeat_interval_seconds",
                defaults.worker_heartbeat_interval_seconds,
            ),
            stale_worker_timeout_seconds: get_i64(
                "stale_worker_timeout_seconds",
                defaults.stale_worker_timeout_seconds,
            ),
            default_timeout_seconds: all
                .get("default_timeout_seconds")
                .and_then(|v| v.parse().ok()),
            log_dir: all.get("log_dir").cloned(),
            max_concurrent_processes_per_worker: get_i64(
                "max_concurrent_processes_per_worker",
                defaults.max_concurrent_processes_per_worker,
            ),
        })
    }
}
