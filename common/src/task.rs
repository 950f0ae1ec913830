use serde::{Deserialize, Serialize};
use std::fmt;

/// Fase de un job: primero todos los map, después todos los reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Map,
    Reduce,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => write!(f, "map"),
            Phase::Reduce => write!(f, "reduce"),
        }
    }
}

/// Argumentos de `Worker.DoTask`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoTaskArgs {
    pub job_name: String,
    /// Archivo de entrada del map (vacío en tareas reduce)
    pub file: String,
    pub phase: Phase,
    pub task_number: usize,
    /// nReduce para tareas map, nMap para tareas reduce
    pub num_other_phase: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoTaskReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DoTaskReply {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(msg.into()),
        }
    }
}

/// Estado de una tarea dentro de una corrida del scheduler.
/// Un intento fallido vuelve a `Pending`; `Completed` es terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Dispatched,
    Completed,
}
