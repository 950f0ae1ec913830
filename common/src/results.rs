use serde::{Deserialize, Serialize};

use crate::job::JobId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResults {
    pub job_id: JobId,
    /// Archivo final con todas las claves del job (CSV clave,valor)
    pub result_file: String,
    /// Salidas individuales de cada reduce
    pub reduce_files: Vec<String>,
}
