use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para hablar con el master")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Envía un job nuevo al master
    Submit {
        /// Patrón de archivos de entrada (visto desde el master)
        #[arg(value_name = "INPUT_GLOB")]
        input_glob: String,

        /// Cantidad de tareas reduce
        #[arg(long = "reduce", default_value_t = 4)]
        n_reduce: usize,

        /// Nombre del job (si falta lo genera el master)
        #[arg(long)]
        name: Option<String>,
    },
    /// Consulta el estado de un job
    Status {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Muestra los archivos de salida de un job
    Results {
        #[arg(value_name = "JOB_ID")]
        id: String,
    },
    /// Lista los workers registrados
    Workers,
    /// Corre un job completo en este proceso, sin master ni workers
    Local {
        #[arg(value_name = "INPUT_GLOB")]
        input_glob: String,

        #[arg(long = "reduce", default_value_t = 4)]
        n_reduce: usize,

        #[arg(long, default_value = "local")]
        name: String,

        #[arg(long, default_value = "./mr-work")]
        work_dir: PathBuf,

        /// Aplicación a correr
        #[arg(long, default_value = "wc")]
        app: String,
    },
}
