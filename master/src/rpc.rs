use async_trait::async_trait;
use common::{DoTaskArgs, DoTaskReply};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

pub const DO_TASK_METHOD: &str = "Worker.DoTask";

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("error de transporte: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("el worker respondió status {0}")]
    Status(u16),

    #[error("el worker rechazó la tarea: {0}")]
    Rejected(String),
}

/// Llamada remota a un worker. Cualquier `Err` se trata como fallo
/// transitorio de la tarea.
#[async_trait]
pub trait RemoteCall: Send + Sync {
    async fn do_task(&self, worker: &str, args: &DoTaskArgs) -> Result<(), RpcError>;
}

/// `Worker.DoTask` sobre HTTP + JSON.
pub struct HttpRemoteCall {
    client: Client,
}

impl HttpRemoteCall {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

pub fn do_task_url(worker: &str) -> String {
    if worker.starts_with("http://") || worker.starts_with("https://") {
        format!("{}/rpc/{}", worker.trim_end_matches('/'), DO_TASK_METHOD)
    } else {
        format!("http://{}/rpc/{}", worker, DO_TASK_METHOD)
    }
}

#[async_trait]
impl RemoteCall for HttpRemoteCall {
    async fn do_task(&self, worker: &str, args: &DoTaskArgs) -> Result<(), RpcError> {
        let resp = self.client.post(do_task_url(worker)).json(args).send().await?;

        if !resp.status().is_success() {
            return Err(RpcError::Status(resp.status().as_u16()));
        }

        let reply: DoTaskReply = resp.json().await?;
        if reply.ok {
            Ok(())
        } else {
            Err(RpcError::Rejected(
                reply.error.unwrap_or_else(|| "sin detalle".to_string()),
            ))
        }
    }
}
