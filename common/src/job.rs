use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::names;
use crate::task::{DoTaskArgs, Phase};

pub type JobId = String;

/// Todo lo que una fase necesita saber del job.
/// Se pasa explícitamente al scheduler, a los workers y al merge.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub name: String,
    /// Directorio compartido donde viven intermedios y salidas
    pub work_dir: PathBuf,
    pub map_files: Vec<String>,
    pub n_reduce: usize,
}

impl JobContext {
    pub fn new(
        name: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        map_files: Vec<String>,
        n_reduce: usize,
    ) -> Self {
        Self {
            name: name.into(),
            work_dir: work_dir.into(),
            map_files,
            n_reduce,
        }
    }

    pub fn n_map(&self) -> usize {
        self.map_files.len()
    }

    pub fn ntasks(&self, phase: Phase) -> usize {
        match phase {
            Phase::Map => self.n_map(),
            Phase::Reduce => self.n_reduce,
        }
    }

    /// Cantidad de la fase opuesta que necesita el worker para ubicar
    /// (o producir) los archivos intermedios.
    pub fn num_other(&self, phase: Phase) -> usize {
        match phase {
            Phase::Map => self.n_reduce,
            Phase::Reduce => self.n_map(),
        }
    }

    /// Un descriptor por índice de tarea, en orden.
    pub fn task_args(&self, phase: Phase) -> Vec<DoTaskArgs> {
        let num_other_phase = self.num_other(phase);
        (0..self.ntasks(phase))
            .map(|i| DoTaskArgs {
                job_name: self.name.clone(),
                file: match phase {
                    Phase::Map => self.map_files[i].clone(),
                    Phase::Reduce => String::new(),
                },
                phase,
                task_number: i,
                num_other_phase,
            })
            .collect()
    }

    pub fn intermediate_path(&self, map_task: usize, reduce_task: usize) -> PathBuf {
        intermediate_path(&self.work_dir, &self.name, map_task, reduce_task)
    }

    pub fn reduce_output_path(&self, reduce_task: usize) -> PathBuf {
        reduce_output_path(&self.work_dir, &self.name, reduce_task)
    }

    pub fn result_path(&self) -> PathBuf {
        self.work_dir.join(names::answer_name(&self.name))
    }
}

pub fn intermediate_path(work_dir: &Path, job_name: &str, map_task: usize, reduce_task: usize) -> PathBuf {
    work_dir.join(names::reduce_name(job_name, map_task, reduce_task))
}

pub fn reduce_output_path(work_dir: &Path, job_name: &str, reduce_task: usize) -> PathBuf {
    work_dir.join(names::merge_name(job_name, reduce_task))
}

/* --------- API del master --------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    /// Si falta, el master genera uno
    #[serde(default)]
    pub name: Option<String>,

    /// Patrón de archivos de entrada, ej: "/data/input/*.txt"
    pub input_glob: String,

    /// Cantidad de tareas reduce (particiones)
    pub n_reduce: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Accepted,
    Running,
    Failed,
    Succeeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,

    pub n_map: usize,
    pub n_reduce: usize,

    /// Fase que se está corriendo ahora mismo
    pub current_phase: Option<Phase>,

    /// -------- Métricas del job --------
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub completed_tasks: usize,
    pub retries: usize,

    /// Ruta del resultado final (sólo cuando termina bien)
    pub result_file: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> JobContext {
        JobContext::new(
            "test",
            "/tmp/mr",
            vec!["a.txt".to_string(), "b.txt".to_string(), "c.txt".to_string()],
            2,
        )
    }

    #[test]
    fn task_args_map_lleva_archivo_y_n_reduce() {
        let args = ctx().task_args(Phase::Map);
        assert_eq!(args.len(), 3);
        for (i, a) in args.iter().enumerate() {
            assert_eq!(a.task_number, i);
            assert_eq!(a.phase, Phase::Map);
            assert_eq!(a.num_other_phase, 2);
        }
        assert_eq!(args[1].file, "b.txt");
    }

    #[test]
    fn task_args_reduce_sin_archivo_y_con_n_map() {
        let args = ctx().task_args(Phase::Reduce);
        assert_eq!(args.len(), 2);
        assert!(args.iter().all(|a| a.file.is_empty() && a.num_other_phase == 3));
    }

    #[test]
    fn rutas_usan_los_nombres_deterministas() {
        let c = ctx();
        assert_eq!(c.intermediate_path(2, 1), PathBuf::from("/tmp/mr/mrtmp.test-2-1"));
        assert_eq!(c.reduce_output_path(0), PathBuf::from("/tmp/mr/mrtmp.test-res-0"));
        assert_eq!(c.result_path(), PathBuf::from("/tmp/mr/mrtmp.test"));
    }

    #[test]
    fn job_request_sin_nombre() {
        let req: JobRequest =
            serde_json::from_str(r#"{"input_glob":"/data/*.txt","n_reduce":4}"#).unwrap();
        assert!(req.name.is_none());
        assert_eq!(req.n_reduce, 4);
    }
}
