use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use common::{
    job::reduce_output_path, JobContext, JobInfo, JobRequest, JobResults, JobStatus, WorkerInfo,
    WorkerRegisterRequest, WorkerRegisterResponse,
};
use glob::glob;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::driver;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/jobs", post(create_job))
        .route("/api/v1/jobs/:id", get(get_job))
        .route("/api/v1/jobs/:id/results", get(get_job_results))
        .route("/api/v1/workers", get(list_workers))
        .route("/api/v1/workers/register", post(register_worker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

/// El nombre del job termina en nombres de archivo: nada de separadores.
fn valid_job_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

// Crea un job: una tarea map por archivo que haga match con input_glob
async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<JobRequest>,
) -> Result<Json<JobInfo>, (StatusCode, String)> {
    let bad_request = |msg: String| (StatusCode::BAD_REQUEST, msg);

    if req.n_reduce == 0 {
        return Err(bad_request("n_reduce debe ser mayor que cero".to_string()));
    }

    let job_id = uuid::Uuid::new_v4().to_string();
    let name = req.name.unwrap_or_else(|| job_id.clone());
    if !valid_job_name(&name) {
        return Err(bad_request(format!("nombre de job inválido: {name}")));
    }

    let entries = glob(&req.input_glob)
        .map_err(|e| bad_request(format!("patrón input_glob inválido: {e}")))?;

    let mut map_files: Vec<String> = entries
        .flatten()
        .filter(|path| path.is_file())
        .map(|path| path.to_string_lossy().to_string())
        .collect();
    map_files.sort();

    if map_files.is_empty() {
        warn!("job {}: input_glob {} no encontró archivos", name, req.input_glob);
    }

    let ctx = JobContext::new(
        name.clone(),
        state.config.work_dir.clone(),
        map_files,
        req.n_reduce,
    );

    let job_info = JobInfo {
        id: job_id.clone(),
        name,
        status: JobStatus::Accepted,
        n_map: ctx.n_map(),
        n_reduce: ctx.n_reduce,
        current_phase: None,
        submitted_at: Utc::now(),
        started_at: None,
        finished_at: None,
        completed_tasks: 0,
        retries: 0,
        result_file: None,
        error: None,
    };

    state.jobs().insert(job_id.clone(), job_info.clone());

    info!(
        "job {} ({}) aceptado: {} maps, {} reduces",
        job_id,
        job_info.name,
        job_info.n_map,
        job_info.n_reduce
    );

    tokio::spawn(driver::run_job(state.clone(), job_id, ctx));

    Ok(Json(job_info))
}

// Devuelve info de un job
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, StatusCode> {
    let job = state.jobs().get(&id).cloned();
    job.map(Json).ok_or(StatusCode::NOT_FOUND)
}

// Archivos de salida de un job terminado
async fn get_job_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResults>, StatusCode> {
    let job = state.jobs().get(&id).cloned().ok_or(StatusCode::NOT_FOUND)?;

    let Some(result_file) = job.result_file else {
        return Err(StatusCode::CONFLICT);
    };

    let reduce_files = (0..job.n_reduce)
        .map(|r| {
            reduce_output_path(&state.config.work_dir, &job.name, r)
                .to_string_lossy()
                .to_string()
        })
        .collect();

    Ok(Json(JobResults {
        job_id: job.id,
        result_file,
        reduce_files,
    }))
}

// Registra un worker (o lo re-activa si ya se conocía)
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegisterRequest>,
) -> Result<Json<WorkerRegisterResponse>, (StatusCode, String)> {
    if req.address.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "address vacío".to_string()));
    }
    let worker_id = state.registry.register(req.address.trim(), &req.hostname);
    Ok(Json(WorkerRegisterResponse { worker_id }))
}

async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerInfo>> {
    Json(state.registry.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MasterConfig;
    use crate::registry::WorkerRegistry;
    use crate::rpc::{RemoteCall, RpcError};
    use crate::scheduler::{RetryPolicy, Scheduler};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use common::DoTaskArgs;
    use std::{env, sync::Arc, time::Duration};
    use tower::ServiceExt;

    struct NoopRpc;

    #[async_trait]
    impl RemoteCall for NoopRpc {
        async fn do_task(&self, _worker: &str, _args: &DoTaskArgs) -> Result<(), RpcError> {
            Ok(())
        }
    }

    fn test_state() -> AppState {
        let registry = WorkerRegistry::new(0);
        let scheduler = Scheduler::new(registry.clone(), Arc::new(NoopRpc), RetryPolicy::default());
        let config = MasterConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            work_dir: env::temp_dir().join("handlers_tests"),
            retry: RetryPolicy::default(),
            rpc_timeout: Duration::from_secs(1),
            worker_failure_limit: 0,
        };
        AppState::new(config, registry, scheduler)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_responde_ok() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn registrar_worker_lo_agrega_al_registro() {
        let state = test_state();
        let app = build_router(state.clone());

        let resp = app
            .oneshot(post_json(
                "/api/v1/workers/register",
                r#"{"address":"10.0.0.5:7000","hostname":"w5"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let parsed: WorkerRegisterResponse = serde_json::from_slice(&body).unwrap();

        let workers = state.registry.snapshot();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].worker_id, parsed.worker_id);
        assert_eq!(workers[0].address, "10.0.0.5:7000");
    }

    #[tokio::test]
    async fn job_sin_reduces_es_bad_request() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(post_json(
                "/api/v1/jobs",
                r#"{"input_glob":"/tmp/*.txt","n_reduce":0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn job_con_nombre_con_barras_es_bad_request() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(post_json(
                "/api/v1/jobs",
                r#"{"name":"../x","input_glob":"/tmp/*.txt","n_reduce":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn job_inexistente_es_404() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::get("/api/v1/jobs/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resultados_de_job_sin_terminar_es_conflict() {
        let state = test_state();
        state.jobs().insert(
            "j".to_string(),
            JobInfo {
                id: "j".to_string(),
                name: "j".to_string(),
                status: JobStatus::Running,
                n_map: 1,
                n_reduce: 1,
                current_phase: None,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
                completed_tasks: 0,
                retries: 0,
                result_file: None,
                error: None,
            },
        );

        let app = build_router(state);
        let resp = app
            .oneshot(Request::get("/api/v1/jobs/j/results").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
