use std::{env, path::PathBuf};

/// Configuración del worker (variables de entorno).
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub master_url: String,
    pub listen_addr: String,
    /// Dirección que se anuncia al master; si falta se usa la de escucha
    pub advertise_addr: Option<String>,
    pub work_dir: PathBuf,
    pub app: String,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            master_url: get("MASTER_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            listen_addr: get("WORKER_LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:7000".to_string()),
            advertise_addr: get("WORKER_ADVERTISE_ADDR").filter(|s| !s.trim().is_empty()),
            work_dir: get("MR_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/data/mr")),
            app: get("MR_APP").unwrap_or_else(|| "wc".to_string()),
        }
    }
}
