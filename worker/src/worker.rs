use anyhow::{anyhow, Context, Result};
use axum::{extract::State, routing::post, Json, Router};
use common::{
    app_by_name, exec::execute_task, DoTaskArgs, DoTaskReply, MapReduceApp,
    WorkerRegisterRequest, WorkerRegisterResponse,
};
use reqwest::Client;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Semaphore, time::sleep};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::WorkerConfig;

const REGISTER_RETRY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct WorkerState {
    pub work_dir: PathBuf,
    pub app: Arc<dyn MapReduceApp>,
    /// Un worker corre una sola tarea a la vez
    pub slot: Arc<Semaphore>,
}

impl WorkerState {
    pub fn new(work_dir: PathBuf, app: Arc<dyn MapReduceApp>) -> Self {
        Self {
            work_dir,
            app,
            slot: Arc::new(Semaphore::new(1)),
        }
    }
}

pub fn build_router(state: WorkerState) -> Router {
    Router::new()
        .route("/rpc/Worker.DoTask", post(do_task))
        .route("/health", axum::routing::get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Loop principal del worker:
/// - levanta el servidor de `Worker.DoTask`
/// - se registra en el master (reintentando hasta que el master conteste)
pub async fn run(config: WorkerConfig) -> Result<()> {
    let app: Arc<dyn MapReduceApp> = app_by_name(&config.app)
        .map(Arc::from)
        .ok_or_else(|| anyhow!("aplicación desconocida: {}", config.app))?;

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creando {}", config.work_dir.display()))?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", config.listen_addr))?;
    let local = listener.local_addr()?;

    let address = config
        .advertise_addr
        .clone()
        .unwrap_or_else(|| local.to_string());

    let router = build_router(WorkerState::new(config.work_dir.clone(), app));
    let server = tokio::spawn(async move { axum::serve(listener, router).await });

    info!(
        "worker escuchando en {} (anunciado como {}), app={}",
        local, address, config.app
    );

    let worker_id = register(&Client::new(), &config.master_url, &address).await;
    info!("worker {} registrado contra {}", worker_id, config.master_url);

    server.await.context("servidor abortado")??;
    Ok(())
}

/// Se registra en el master; si no responde, reintenta cada pocos segundos.
async fn register(client: &Client, master_url: &str, address: &str) -> String {
    let url = format!("{}/api/v1/workers/register", master_url);

    // Nombre de host (solo para info)
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    loop {
        let attempt = async {
            let resp = client
                .post(&url)
                .json(&WorkerRegisterRequest {
                    address: address.to_string(),
                    hostname: hostname.clone(),
                })
                .send()
                .await?
                .error_for_status()?;
            let WorkerRegisterResponse { worker_id } = resp.json().await?;
            Ok::<_, reqwest::Error>(worker_id)
        }
        .await;

        match attempt {
            Ok(worker_id) => return worker_id,
            Err(e) => {
                warn!("no se pudo registrar en {}: {}; reintento en {:?}", url, e, REGISTER_RETRY);
                sleep(REGISTER_RETRY).await;
            }
        }
    }
}

async fn do_task(
    State(state): State<WorkerState>,
    Json(args): Json<DoTaskArgs>,
) -> Json<DoTaskReply> {
    let Ok(permit) = state.slot.clone().try_acquire_owned() else {
        warn!("llegó {} {} pero ya hay una tarea corriendo", args.phase, args.task_number);
        return Json(DoTaskReply::failed("worker ocupado"));
    };

    let label = format!("{} {} del job {}", args.phase, args.task_number, args.job_name);
    info!("tengo tarea {}", label);

    let work_dir = state.work_dir.clone();
    let app = state.app.clone();
    // El permiso vive dentro del closure: si el master corta la conexión y
    // este handler se descarta, el slot sigue ocupado hasta que la tarea termine.
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        execute_task(&work_dir, app.as_ref(), &args)
    });

    match handle.await {
        Ok(Ok(())) => {
            info!("terminé tarea {} correctamente", label);
            Json(DoTaskReply::ok())
        }
        Ok(Err(e)) => {
            warn!("error procesando tarea {}: {}", label, e);
            Json(DoTaskReply::failed(e.to_string()))
        }
        Err(e) => {
            warn!("panic o join error en tarea {}: {:?}", label, e);
            Json(DoTaskReply::failed(format!("tarea abortada: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use common::{job::intermediate_path, KeyValue, Phase, WordCount};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::{env, fs, thread};
    use tower::ServiceExt;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("worker_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    async fn call(state: WorkerState, args: &DoTaskArgs) -> DoTaskReply {
        let req = Request::post("/rpc/Worker.DoTask")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(args).unwrap()))
            .unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn do_task_map_escribe_los_intermedios() {
        let tmp = temp_dir("map");
        let input = tmp.join("in.txt");
        fs::write(&input, "a b c").unwrap();

        let state = WorkerState::new(tmp.clone(), Arc::new(WordCount));
        let args = DoTaskArgs {
            job_name: "wt".to_string(),
            file: input.to_string_lossy().to_string(),
            phase: Phase::Map,
            task_number: 0,
            num_other_phase: 2,
        };

        let reply = call(state, &args).await;

        assert!(reply.ok, "{:?}", reply.error);
        assert!(intermediate_path(&tmp, "wt", 0, 0).exists());
        assert!(intermediate_path(&tmp, "wt", 0, 1).exists());
    }

    #[tokio::test]
    async fn do_task_reduce_sin_intermedios_responde_fallo() {
        let tmp = temp_dir("reduce");
        let state = WorkerState::new(tmp, Arc::new(WordCount));
        let args = DoTaskArgs {
            job_name: "wt".to_string(),
            file: String::new(),
            phase: Phase::Reduce,
            task_number: 0,
            num_other_phase: 1,
        };

        let reply = call(state, &args).await;

        assert!(!reply.ok);
        assert!(reply.error.unwrap().contains("reduce 0"));
    }

    #[tokio::test]
    async fn do_task_con_worker_ocupado_rechaza() {
        let tmp = temp_dir("ocupado");
        let state = WorkerState::new(tmp, Arc::new(WordCount));
        let _busy = state.slot.clone().try_acquire_owned().unwrap();

        let args = DoTaskArgs {
            job_name: "wt".to_string(),
            file: String::new(),
            phase: Phase::Reduce,
            task_number: 0,
            num_other_phase: 0,
        };
        let reply = call(state.clone(), &args).await;

        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("worker ocupado"));
    }

    /// App cuyo map tarda y que cuenta cuántas ejecuciones hay en paralelo.
    struct SlowApp {
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl MapReduceApp for SlowApp {
        fn map(&self, _file: &str, _contents: &str) -> Vec<KeyValue> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            vec![KeyValue::new("k", "1")]
        }

        fn reduce(&self, _key: &str, values: &[String]) -> String {
            values.len().to_string()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn conexion_cortada_no_libera_el_slot_antes_de_tiempo() {
        let tmp = temp_dir("cortada");
        let input = tmp.join("in.txt");
        fs::write(&input, "x").unwrap();

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let app = SlowApp {
            delay: Duration::from_millis(800),
            running: running.clone(),
            peak: peak.clone(),
        };
        let state = WorkerState::new(tmp.clone(), Arc::new(app));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { axum::serve(listener, build_router(state)).await });
        let url = format!("http://{}/rpc/Worker.DoTask", addr);

        let args = DoTaskArgs {
            job_name: "cut".to_string(),
            file: input.to_string_lossy().to_string(),
            phase: Phase::Map,
            task_number: 0,
            num_other_phase: 1,
        };

        // El master se cansa de esperar y corta la conexión
        let impatient = Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        assert!(impatient.post(&url).json(&args).send().await.is_err());

        sleep(Duration::from_millis(50)).await;

        // La primera tarea sigue corriendo: la segunda debe ser rechazada
        let retry = DoTaskArgs {
            task_number: 1,
            ..args.clone()
        };
        let reply: DoTaskReply = Client::new()
            .post(&url)
            .json(&retry)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("worker ocupado"));

        // Cuando termina, el slot vuelve a estar libre
        sleep(Duration::from_millis(1000)).await;
        let reply: DoTaskReply = Client::new()
            .post(&url)
            .json(&retry)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(reply.ok, "{:?}", reply.error);

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        server.abort();
    }
}
