use std::{
    fs,
    hash::Hasher,
    io,
    path::{Path, PathBuf},
};
use fnv::FnvHasher;
use thiserror::Error;
use tracing::debug;

use crate::job::intermediate_path;
use crate::kv::{CodecError, KeyValue, KvWriter};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("n_reduce debe ser mayor que cero")]
    NoPartitions,

    #[error("no se pudo leer la entrada {path}: {source}")]
    Input { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Partición (reduce) que le toca a una clave.
///
/// FNV-1a de 64 bits sobre los bytes de la clave: el resultado no depende
/// del binario, así master y workers compilados por separado coinciden.
pub fn partition_for(key: &str, n_reduce: usize) -> usize {
    let mut h = FnvHasher::default();
    h.write(key.as_bytes());
    (h.finish() % n_reduce as u64) as usize
}

/// Corre un map: lee `in_file`, aplica `map_f` y reparte los registros
/// en `n_reduce` archivos intermedios. Siempre crea los `n_reduce` archivos,
/// aunque alguno quede vacío, para que el reduce encuentre todos los que busca.
pub fn do_map<F>(
    work_dir: &Path,
    job_name: &str,
    map_task: usize,
    in_file: &str,
    n_reduce: usize,
    map_f: F,
) -> Result<(), MapError>
where
    F: Fn(&str, &str) -> Vec<KeyValue>,
{
    if n_reduce == 0 {
        return Err(MapError::NoPartitions);
    }

    let contents = fs::read_to_string(in_file).map_err(|source| MapError::Input {
        path: PathBuf::from(in_file),
        source,
    })?;

    let kvs = map_f(in_file, &contents);

    let mut writers = (0..n_reduce)
        .map(|r| KvWriter::create(&intermediate_path(work_dir, job_name, map_task, r)))
        .collect::<Result<Vec<_>, _>>()?;

    for kv in &kvs {
        writers[partition_for(&kv.key, n_reduce)].write(kv)?;
    }

    for w in writers {
        w.finish()?;
    }

    debug!(
        "map {} del job {}: {} registros en {} particiones",
        map_task,
        job_name,
        kvs.len(),
        n_reduce
    );
    Ok(())
}
