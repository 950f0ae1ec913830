use anyhow::{Context, Result};
use chrono::Utc;
use common::{merge::merge, JobContext, JobId, JobStatus, Phase};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::state::AppState;

/// Corre un job entero: fase map, fase reduce y merge final.
/// El resultado queda reflejado en el `JobInfo` del job.
pub async fn run_job(state: AppState, job_id: JobId, ctx: JobContext) {
    state.update_job(&job_id, |job| {
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
    });

    match drive(&state, &job_id, &ctx).await {
        Ok(result) => {
            info!("job {} ({}) terminado: {}", job_id, ctx.name, result.display());
            state.update_job(&job_id, |job| {
                job.status = JobStatus::Succeeded;
                job.current_phase = None;
                job.finished_at = Some(Utc::now());
                job.result_file = Some(result.to_string_lossy().to_string());
            });
        }
        Err(e) => {
            warn!("job {} ({}) falló: {:#}", job_id, ctx.name, e);
            state.update_job(&job_id, |job| {
                job.status = JobStatus::Failed;
                job.finished_at = Some(Utc::now());
                job.error = Some(format!("{:#}", e));
            });
        }
    }
}

async fn drive(state: &AppState, job_id: &str, ctx: &JobContext) -> Result<PathBuf> {
    for phase in [Phase::Map, Phase::Reduce] {
        state.update_job(job_id, |job| job.current_phase = Some(phase));

        let report = state
            .scheduler
            .run_phase(ctx, phase)
            .await
            .with_context(|| format!("fase {}", phase))?;

        state.update_job(job_id, |job| {
            job.completed_tasks += report.ntasks;
            job.retries += report.failures;
        });
    }

    // el merge lee todas las salidas del disco: fuera del runtime async
    let work_dir = ctx.work_dir.clone();
    let name = ctx.name.clone();
    let n_reduce = ctx.n_reduce;
    let result = tokio::task::spawn_blocking(move || merge(&work_dir, &name, n_reduce))
        .await
        .context("merge abortado")?
        .context("merge final")?;

    Ok(result)
}
