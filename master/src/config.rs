use std::{env, path::PathBuf, time::Duration};

use crate::scheduler::RetryPolicy;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_WORK_DIR: &str = "/data/mr";
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WORKER_FAILURE_LIMIT: u32 = 3;

/// Configuración del master, leída de variables de entorno.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub listen_addr: String,
    /// Directorio compartido con los workers
    pub work_dir: PathBuf,
    pub retry: RetryPolicy,
    pub rpc_timeout: Duration,
    pub worker_failure_limit: u32,
}

impl MasterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            // 0 o ausente = sin límite
            max_attempts: parse_u64("MR_MAX_TASK_ATTEMPTS")
                .filter(|n| *n > 0)
                .map(|n| n.min(u32::MAX as u64) as u32),
            base_backoff: parse_u64("MR_RETRY_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
            max_backoff: parse_u64("MR_RETRY_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
        };

        Self {
            listen_addr: get("MR_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            work_dir: get("MR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR)),
            retry,
            rpc_timeout: Duration::from_secs(
                parse_u64("MR_RPC_TIMEOUT_SECS").unwrap_or(DEFAULT_RPC_TIMEOUT_SECS),
            ),
            worker_failure_limit: parse_u64("MR_WORKER_FAILURE_LIMIT")
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(DEFAULT_WORKER_FAILURE_LIMIT),
        }
    }
}
