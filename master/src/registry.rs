// master/src/registry.rs

use common::{WorkerId, WorkerInfo};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Registro de workers: cola de direcciones libres + metadatos.
///
/// Cada dirección libre se entrega a un único consumidor. Mientras el worker
/// está ocupado no vuelve a la cola; cuando su `WorkerLease` se suelta,
/// el registro lo vuelve a ofrecer (salvo que se haya retirado por fallar).
#[derive(Clone)]
pub struct WorkerRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    idle_tx: mpsc::UnboundedSender<String>,
    idle_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    workers: Mutex<HashMap<String, WorkerMeta>>,
    failure_limit: u32,
}

#[derive(Debug, Clone)]
struct WorkerMeta {
    worker_id: WorkerId,
    hostname: String,
    idle: bool,
    retired: bool,
    tasks_succeeded: u64,
    tasks_failed: u64,
    consecutive_failures: u32,
}

impl Inner {
    fn workers(&self) -> MutexGuard<'_, HashMap<String, WorkerMeta>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn offer(&self, address: &str) {
        // idle_rx vive en el mismo Inner, el canal no puede estar cerrado
        let _ = self.idle_tx.send(address.to_string());
    }
}

impl WorkerRegistry {
    /// `failure_limit`: fallos seguidos tras los cuales un worker se retira (0 = nunca).
    pub fn new(failure_limit: u32) -> Self {
        let (idle_tx, idle_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                idle_tx,
                idle_rx: tokio::sync::Mutex::new(idle_rx),
                workers: Mutex::new(HashMap::new()),
                failure_limit,
            }),
        }
    }

    /// Alta de un worker. Si la dirección ya estaba registrada y activa no
    /// cambia nada; si estaba retirada, vuelve a ofrecerse.
    pub fn register(&self, address: &str, hostname: &str) -> WorkerId {
        let mut workers = self.inner.workers();

        if let Some(meta) = workers.get_mut(address) {
            if meta.retired {
                meta.retired = false;
                meta.idle = true;
                meta.consecutive_failures = 0;
                info!("worker {} ({}) vuelve a registrarse", meta.worker_id, address);
                self.inner.offer(address);
            }
            return meta.worker_id.clone();
        }

        let worker_id = uuid::Uuid::new_v4().to_string();
        workers.insert(
            address.to_string(),
            WorkerMeta {
                worker_id: worker_id.clone(),
                hostname: hostname.to_string(),
                idle: true,
                retired: false,
                tasks_succeeded: 0,
                tasks_failed: 0,
                consecutive_failures: 0,
            },
        );
        info!("worker registrado: {} en {}", worker_id, address);
        self.inner.offer(address);
        worker_id
    }

    /// Espera hasta que haya un worker libre y lo toma.
    /// Sólo devuelve `None` si el canal se cerró.
    pub async fn acquire(&self) -> Option<WorkerLease> {
        loop {
            let address = {
                let mut rx = self.inner.idle_rx.lock().await;
                rx.recv().await?
            };

            let mut workers = self.inner.workers();
            match workers.get_mut(&address) {
                Some(meta) if meta.idle && !meta.retired => {
                    meta.idle = false;
                    return Some(WorkerLease {
                        inner: self.inner.clone(),
                        address,
                        outcome: None,
                    });
                }
                // entrada vieja de un worker retirado o ya tomado
                _ => continue,
            }
        }
    }

    pub fn snapshot(&self) -> Vec<WorkerInfo> {
        let workers = self.inner.workers();
        let mut out: Vec<WorkerInfo> = workers
            .iter()
            .map(|(address, meta)| WorkerInfo {
                worker_id: meta.worker_id.clone(),
                address: address.clone(),
                hostname: meta.hostname.clone(),
                idle: meta.idle,
                retired: meta.retired,
                tasks_succeeded: meta.tasks_succeeded,
                tasks_failed: meta.tasks_failed,
                consecutive_failures: meta.consecutive_failures,
            })
            .collect();
        out.sort_by(|a, b| a.address.cmp(&b.address));
        out
    }
}

/// Préstamo de un worker para un único despacho.
/// Al soltarse devuelve el worker al registro.
pub struct WorkerLease {
    inner: Arc<Inner>,
    address: String,
    outcome: Option<bool>,
}

impl WorkerLease {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn succeeded(mut self) {
        self.outcome = Some(true);
    }

    pub fn failed(mut self) {
        self.outcome = Some(false);
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        let mut workers = self.inner.workers();
        let Some(meta) = workers.get_mut(&self.address) else {
            return;
        };

        match self.outcome {
            Some(true) => {
                meta.tasks_succeeded += 1;
                meta.consecutive_failures = 0;
            }
            Some(false) => {
                meta.tasks_failed += 1;
                meta.consecutive_failures += 1;
            }
            // despacho cancelado: no cuenta para nada
            None => {}
        }

        let limit = self.inner.failure_limit;
        if limit > 0 && meta.consecutive_failures >= limit {
            meta.retired = true;
            meta.idle = false;
            warn!(
                "retirando worker {} ({}) tras {} fallos seguidos",
                meta.worker_id, self.address, meta.consecutive_failures
            );
            return;
        }

        meta.idle = true;
        self.inner.offer(&self.address);
    }
}
