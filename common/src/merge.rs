use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

use crate::job::reduce_output_path;
use crate::kv::{read_kvs, CodecError, KeyValue, TmpFile};
use crate::names::answer_name;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("salida del reduce {reduce_task} ilegible: {source}")]
    ReduceOutput {
        reduce_task: usize,
        #[source]
        source: CodecError,
    },

    #[error("error escribiendo CSV en {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("error de E/S en {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Junta las salidas de los `n_reduce` reduces en un único CSV
/// `clave,valor` (sin encabezado), ordenado por clave.
pub fn merge(work_dir: &Path, job_name: &str, n_reduce: usize) -> Result<PathBuf, MergeError> {
    let mut all: Vec<KeyValue> = Vec::new();
    for reduce_task in 0..n_reduce {
        let path = reduce_output_path(work_dir, job_name, reduce_task);
        let mut kvs =
            read_kvs(&path).map_err(|source| MergeError::ReduceOutput { reduce_task, source })?;
        all.append(&mut kvs);
    }

    all.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));

    let out_path = work_dir.join(answer_name(job_name));
    let tmp = TmpFile::for_target(&out_path);
    let tmp_path = tmp.path().to_path_buf();

    let csv_err = |source: csv::Error| MergeError::Csv {
        path: tmp_path.clone(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp_path)
        .map_err(csv_err)?;

    for kv in &all {
        writer
            .write_record([kv.key.as_str(), kv.value.as_str()])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| MergeError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    drop(writer);

    tmp.persist(&out_path).map_err(|source| MergeError::Io {
        path: out_path.clone(),
        source,
    })?;

    info!(
        "merge del job {}: {} claves en {}",
        job_name,
        all.len(),
        out_path.display()
    );
    Ok(out_path)
}
