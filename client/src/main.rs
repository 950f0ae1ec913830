mod cli;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use common::{
    app_by_name, sequential::run_sequential, JobContext, JobInfo, JobRequest, JobResults,
    WorkerInfo,
};
use reqwest::{Client, StatusCode};
use std::env;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

/// Igual que en el worker:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn print_job(job_info: &JobInfo) {
    println!("Job:");
    println!("  id: {}", job_info.id);
    println!("  nombre: {}", job_info.name);
    println!("  estado: {:?}", job_info.status);
    println!("  maps/reduces: {}/{}", job_info.n_map, job_info.n_reduce);
    if let Some(phase) = job_info.current_phase {
        println!("  fase: {}", phase);
    }
    println!(
        "  tareas completadas: {} (reintentos: {})",
        job_info.completed_tasks, job_info.retries
    );
    if let Some(err) = &job_info.error {
        println!("  error: {}", err);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("common=info")),
        )
        .init();

    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Submit {
            input_glob,
            n_reduce,
            name,
        } => {
            let url = format!("{}/api/v1/jobs", base_url);
            let resp = client
                .post(&url)
                .json(&JobRequest {
                    name,
                    input_glob,
                    n_reduce,
                })
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let msg = resp.text().await.unwrap_or_default();
                bail!("el master rechazó el job ({}): {}", status, msg);
            }

            let job_info: JobInfo = resp.json().await?;
            println!("Job creado:");
            print_job(&job_info);
        }
        Commands::Status { id } => {
            let url = format!("{}/api/v1/jobs/{id}", base_url);
            let resp = client.get(&url).send().await?;

            if resp.status().is_success() {
                let job_info: JobInfo = resp.json().await?;
                print_job(&job_info);
            } else {
                println!("No se encontró el job con id {id}");
            }
        }
        Commands::Results { id } => {
            let url = format!("{}/api/v1/jobs/{id}/results", base_url);
            let resp = client.get(&url).send().await?;

            match resp.status() {
                StatusCode::NOT_FOUND => println!("No se encontró el job con id {id}"),
                StatusCode::CONFLICT => println!("El job {id} todavía no terminó"),
                s if s.is_success() => {
                    let results: JobResults = resp.json().await?;
                    println!("Resultado: {}", results.result_file);
                    for f in results.reduce_files {
                        println!("  - {}", f);
                    }
                }
                s => bail!("respuesta inesperada del master: {}", s),
            }
        }
        Commands::Workers => {
            let url = format!("{}/api/v1/workers", base_url);
            let workers: Vec<WorkerInfo> = client.get(&url).send().await?.json().await?;

            if workers.is_empty() {
                println!("No hay workers registrados");
            }
            for w in workers {
                let estado = if w.retired {
                    "retirado"
                } else if w.idle {
                    "libre"
                } else {
                    "ocupado"
                };
                println!(
                    "{} {} ({}) {} ok={} fallos={}",
                    w.worker_id, w.address, w.hostname, estado, w.tasks_succeeded, w.tasks_failed
                );
            }
        }
        Commands::Local {
            input_glob,
            n_reduce,
            name,
            work_dir,
            app,
        } => {
            if n_reduce == 0 {
                bail!("--reduce debe ser mayor que cero");
            }
            let app = app_by_name(&app).ok_or_else(|| anyhow!("aplicación desconocida: {app}"))?;

            let mut files: Vec<String> = glob::glob(&input_glob)
                .with_context(|| format!("patrón inválido: {input_glob}"))?
                .flatten()
                .filter(|p| p.is_file())
                .map(|p| p.to_string_lossy().to_string())
                .collect();
            files.sort();

            let ctx = JobContext::new(name, work_dir, files, n_reduce);
            let out = tokio::task::spawn_blocking(move || run_sequential(&ctx, app.as_ref()))
                .await??;
            println!("Resultado: {}", out.display());
        }
    }

    Ok(())
}
