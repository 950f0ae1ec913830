// master/src/state.rs

use common::{JobId, JobInfo};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::config::MasterConfig;
use crate::registry::WorkerRegistry;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<Mutex<HashMap<JobId, JobInfo>>>,
    pub registry: WorkerRegistry,
    pub scheduler: Scheduler,
    pub config: Arc<MasterConfig>,
}

impl AppState {
    pub fn new(config: MasterConfig, registry: WorkerRegistry, scheduler: Scheduler) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            registry,
            scheduler,
            config: Arc::new(config),
        }
    }

    pub fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobInfo>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Aplica `f` al job si existe.
    pub fn update_job<F>(&self, job_id: &str, f: F)
    where
        F: FnOnce(&mut JobInfo),
    {
        if let Some(job) = self.jobs().get_mut(job_id) {
            f(job);
        }
    }
}
