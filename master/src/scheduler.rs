use common::{DoTaskArgs, JobContext, Phase, TaskState};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::registry::WorkerRegistry;
use crate::rpc::RemoteCall;

/// Política de reintentos por tarea.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Intentos máximos por índice de tarea; `None` = sin límite
    pub max_attempts: Option<u32>,
    /// Espera antes del segundo intento; se duplica en cada fallo
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Espera después del fallo número `failed_attempts` (>= 1).
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("tareas inválidas para la fase {phase}: {reason}")]
    InvalidTasks { phase: Phase, reason: String },

    #[error("la tarea {phase} {task} falló {attempts} veces")]
    TaskExhausted {
        phase: Phase,
        task: usize,
        attempts: u32,
    },

    #[error("el registro de workers se cerró")]
    RegistryClosed,

    #[error("tarea de despacho abortada: {0}")]
    Join(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub ntasks: usize,
    /// Despachos hechos (éxitos + fallos)
    pub attempts: usize,
    pub failures: usize,
}

/// Estado por índice de tarea durante una corrida.
struct TaskTracker {
    states: Mutex<Vec<TaskState>>,
    attempts: Mutex<(usize, usize)>,
}

impl TaskTracker {
    fn new(ntasks: usize) -> Self {
        Self {
            states: Mutex::new(vec![TaskState::Pending; ntasks]),
            attempts: Mutex::new((0, 0)),
        }
    }

    fn transition(&self, task: usize, from: TaskState, to: TaskState) {
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert_eq!(states[task], from, "tarea {} en estado inesperado", task);
        states[task] = to;
    }

    fn dispatched(&self, task: usize) {
        self.transition(task, TaskState::Pending, TaskState::Dispatched);
        self.attempts.lock().unwrap_or_else(|e| e.into_inner()).0 += 1;
    }

    fn completed(&self, task: usize) {
        self.transition(task, TaskState::Dispatched, TaskState::Completed);
    }

    fn failed(&self, task: usize) {
        self.transition(task, TaskState::Dispatched, TaskState::Pending);
        self.attempts.lock().unwrap_or_else(|e| e.into_inner()).1 += 1;
    }

    fn all_completed(&self) -> bool {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        states.iter().all(|s| *s == TaskState::Completed)
    }

    fn report(&self, phase: Phase) -> PhaseReport {
        let ntasks = self.states.lock().unwrap_or_else(|e| e.into_inner()).len();
        let (attempts, failures) = *self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        PhaseReport {
            phase,
            ntasks,
            attempts,
            failures,
        }
    }
}

/// Reparte las tareas de una fase entre los workers del registro.
#[derive(Clone)]
pub struct Scheduler {
    registry: WorkerRegistry,
    rpc: Arc<dyn RemoteCall>,
    policy: RetryPolicy,
}

impl Scheduler {
    pub fn new(registry: WorkerRegistry, rpc: Arc<dyn RemoteCall>, policy: RetryPolicy) -> Self {
        Self {
            registry,
            rpc,
            policy,
        }
    }

    /// Corre una fase completa del job.
    pub async fn run_phase(
        &self,
        ctx: &JobContext,
        phase: Phase,
    ) -> Result<PhaseReport, ScheduleError> {
        self.schedule(&ctx.name, phase, ctx.task_args(phase)).await
    }

    /// Despacha todas las tareas y vuelve cuando cada índice terminó bien
    /// exactamente una vez. Los fallos de un worker se reintentan con otro
    /// worker y no llegan a quien llama, salvo que se agoten los intentos.
    pub async fn schedule(
        &self,
        job_name: &str,
        phase: Phase,
        tasks: Vec<DoTaskArgs>,
    ) -> Result<PhaseReport, ScheduleError> {
        validate(job_name, phase, &tasks)?;

        let ntasks = tasks.len();
        let n_other = tasks.first().map(|t| t.num_other_phase).unwrap_or(0);
        info!(
            "schedule: job {} {} tareas {} ({} I/Os)",
            job_name, ntasks, phase, n_other
        );

        let tracker = Arc::new(TaskTracker::new(ntasks));
        if ntasks == 0 {
            return Ok(tracker.report(phase));
        }

        let mut in_flight = JoinSet::new();
        for args in tasks {
            in_flight.spawn(run_task(
                self.registry.clone(),
                self.rpc.clone(),
                self.policy.clone(),
                tracker.clone(),
                args,
            ));
        }

        // barrera: una finalización por tarea
        while let Some(joined) = in_flight.join_next().await {
            let outcome = joined.map_err(|e| ScheduleError::Join(e.to_string()));
            if let Err(e) = outcome.and_then(|r| r) {
                in_flight.abort_all();
                warn!("schedule: job {} fase {} abortada: {}", job_name, phase, e);
                return Err(e);
            }
        }

        debug_assert!(tracker.all_completed());
        let report = tracker.report(phase);
        info!(
            "schedule: job {} fase {} terminada ({} despachos, {} fallos)",
            job_name, phase, report.attempts, report.failures
        );
        Ok(report)
    }
}

/// Chequeos de contrato antes de despachar nada.
fn validate(job_name: &str, phase: Phase, tasks: &[DoTaskArgs]) -> Result<(), ScheduleError> {
    let invalid = |reason: String| ScheduleError::InvalidTasks { phase, reason };

    for (i, t) in tasks.iter().enumerate() {
        if t.task_number != i {
            return Err(invalid(format!(
                "la posición {} trae task_number {}",
                i, t.task_number
            )));
        }
        if t.phase != phase {
            return Err(invalid(format!("la tarea {} es de la fase {}", i, t.phase)));
        }
        if t.job_name != job_name {
            return Err(invalid(format!(
                "la tarea {} pertenece al job {}",
                i, t.job_name
            )));
        }
        if phase == Phase::Map && t.num_other_phase == 0 {
            return Err(invalid("un map necesita al menos un reduce".to_string()));
        }
    }

    Ok(())
}

/// Ciclo de vida de un índice: pedir worker, despachar, y ante un fallo
/// devolver el worker, esperar y volver a pedir otro. Un índice nunca tiene
/// dos despachos a la vez porque el reintento empieza después del fallo.
async fn run_task(
    registry: WorkerRegistry,
    rpc: Arc<dyn RemoteCall>,
    policy: RetryPolicy,
    tracker: Arc<TaskTracker>,
    args: DoTaskArgs,
) -> Result<(), ScheduleError> {
    let task = args.task_number;
    let mut attempts: u32 = 0;

    loop {
        let lease = registry
            .acquire()
            .await
            .ok_or(ScheduleError::RegistryClosed)?;

        attempts += 1;
        tracker.dispatched(task);
        debug!(
            "despachando {} {} (intento {}) a {}",
            args.phase,
            task,
            attempts,
            lease.address()
        );

        match rpc.do_task(lease.address(), &args).await {
            Ok(()) => {
                tracker.completed(task);
                lease.succeeded();
                return Ok(());
            }
            Err(e) => {
                tracker.failed(task);
                warn!(
                    "{} {} falló en {} (intento {}): {}",
                    args.phase,
                    task,
                    lease.address(),
                    attempts,
                    e
                );
                lease.failed();

                if let Some(max) = policy.max_attempts {
                    if attempts >= max {
                        return Err(ScheduleError::TaskExhausted {
                            phase: args.phase,
                            task,
                            attempts,
                        });
                    }
                }

                let wait = policy.backoff(attempts);
                if !wait.is_zero() {
                    debug!("reintentando {} {} en {:?}", args.phase, task, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
