use serde::{Deserialize, Serialize};

pub type WorkerId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterRequest {
    /// Dirección host:puerto donde el worker atiende `Worker.DoTask`
    pub address: String,
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterResponse {
    pub worker_id: WorkerId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub address: String,
    pub hostname: String,
    pub idle: bool,
    pub retired: bool,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub consecutive_failures: u32,
}
