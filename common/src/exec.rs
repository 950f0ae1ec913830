use std::path::Path;
use thiserror::Error;

use crate::apps::MapReduceApp;
use crate::job::reduce_output_path;
use crate::map::{do_map, MapError};
use crate::reduce::{do_reduce, ReduceError};
use crate::task::{DoTaskArgs, Phase};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("map {task}: {source}")]
    Map {
        task: usize,
        #[source]
        source: MapError,
    },

    #[error("reduce {task}: {source}")]
    Reduce {
        task: usize,
        #[source]
        source: ReduceError,
    },
}

/// Ejecuta una tarea tal como la recibe un worker en `Worker.DoTask`.
pub fn execute_task(
    work_dir: &Path,
    app: &dyn MapReduceApp,
    args: &DoTaskArgs,
) -> Result<(), TaskError> {
    match args.phase {
        Phase::Map => do_map(
            work_dir,
            &args.job_name,
            args.task_number,
            &args.file,
            args.num_other_phase,
            |f, c| app.map(f, c),
        )
        .map_err(|source| TaskError::Map {
            task: args.task_number,
            source,
        }),
        Phase::Reduce => {
            let out = reduce_output_path(work_dir, &args.job_name, args.task_number);
            do_reduce(
                work_dir,
                &args.job_name,
                args.task_number,
                &out,
                args.num_other_phase,
                |k, vs| app.reduce(k, vs),
            )
            .map(|_| ())
            .map_err(|source| TaskError::Reduce {
                task: args.task_number,
                source,
            })
        }
    }
}
