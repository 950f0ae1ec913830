use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::job::intermediate_path;
use crate::kv::{read_kvs, CodecError, KeyValue, KvWriter};

/// Fallos de una tarea reduce. Ninguno produce salida parcial:
/// quien llama decide si reintentar la tarea entera o abortar el job.
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("falta el intermedio del map {map_task} ({path})")]
    MissingInput { map_task: usize, path: PathBuf },

    #[error("intermedio corrupto del map {map_task}: {source}")]
    Corrupt {
        map_task: usize,
        #[source]
        source: CodecError,
    },

    #[error("no se pudo escribir la salida: {0}")]
    Output(#[source] CodecError),
}

/// Corre un reduce.
///
/// 1. Lee los `n_map` intermedios de esta partición.
/// 2. Ordena todo por clave (orden estable: los valores de una clave quedan
///    en orden de map y, dentro de cada map, en orden de archivo).
/// 3. Llama a `reduce_f` una vez por clave distinta.
/// 4. Escribe un registro por clave, en orden ascendente, en `out_file`.
///
/// Devuelve la cantidad de claves escritas.
pub fn do_reduce<F>(
    work_dir: &Path,
    job_name: &str,
    reduce_task: usize,
    out_file: &Path,
    n_map: usize,
    reduce_f: F,
) -> Result<usize, ReduceError>
where
    F: Fn(&str, &[String]) -> String,
{
    let mut kvs: Vec<KeyValue> = Vec::new();

    for map_task in 0..n_map {
        let path = intermediate_path(work_dir, job_name, map_task, reduce_task);
        let mut part = read_kvs(&path).map_err(|e| match e {
            CodecError::Open { .. } => ReduceError::MissingInput {
                map_task,
                path: path.clone(),
            },
            other => ReduceError::Corrupt {
                map_task,
                source: other,
            },
        })?;
        kvs.append(&mut part);
    }

    // sort_by es estable
    kvs.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));

    let mut writer = KvWriter::create(out_file).map_err(ReduceError::Output)?;

    for (key, values) in group_sorted(kvs) {
        let reduced = reduce_f(&key, &values);
        writer
            .write(&KeyValue::new(key, reduced))
            .map_err(ReduceError::Output)?;
    }

    let written = writer.finish().map_err(ReduceError::Output)?;

    debug!(
        "reduce {} del job {}: {} claves desde {} maps -> {}",
        reduce_task,
        job_name,
        written,
        n_map,
        out_file.display()
    );
    Ok(written)
}

/// Agrupa registros ya ordenados en corridas maximales de misma clave.
fn group_sorted(kvs: Vec<KeyValue>) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();

    for kv in kvs {
        if let Some((key, values)) = groups.last_mut() {
            if *key == kv.key {
                values.push(kv.value);
                continue;
            }
        }
        groups.push((kv.key, vec![kv.value]));
    }

    groups
}
