use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::app::ingest_use_case::{BatchMode, BatchReport, IngestUseCase};
use crate::app::ports::{GatewayConnector, TransferGateway};
use crate::status::{StatusSink, WorkerEvent};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a batch is already running")]
    Busy,
}

/// A unit of work for the background worker
#[derive(Debug, Clone)]
pub struct Job {
    pub mode: BatchMode,
    /// Explicit file names; `None` means every remote candidate
    pub selection: Option<Vec<String>>,
    /// Case-insensitive substring filter over candidate names
    pub filter: Option<String>,
}

impl Job {
    pub fn new(mode: BatchMode) -> Self {
        Self { mode, selection: None, filter: None }
    }

    pub fn with_selection(mut self, names: Vec<String>) -> Self {
        self.selection = if names.is_empty() { None } else { Some(names) };
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }
}

/// Context for the interactive surface: connection, busy flag and the
/// orchestrator shared with the worker.
///
/// `start` and `observe` are meant to be called from the interactive side
/// only; the worker reports back exclusively through the event channel.
pub struct Session {
    connector: Arc<dyn GatewayConnector>,
    gateway: Arc<Mutex<Option<Arc<dyn TransferGateway>>>>,
    use_case: Arc<Mutex<IngestUseCase>>,
    busy: bool,
}

impl Session {
    pub fn new(connector: Arc<dyn GatewayConnector>, use_case: IngestUseCase) -> Self {
        Self {
            connector,
            gateway: Arc::new(Mutex::new(None)),
            use_case: Arc::new(Mutex::new(use_case)),
            busy: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Spawn a worker for `job`. The returned channel yields status lines and
    /// ends with exactly one `Finished` event.
    pub fn start(&mut self, job: Job) -> Result<UnboundedReceiver<WorkerEvent>, SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        self.busy = true;

        let (tx, rx) = mpsc::unbounded_channel();
        let connector = self.connector.clone();
        let gateway = self.gateway.clone();
        let use_case = self.use_case.clone();
        let worker_tx = tx.clone();
        let mode = job.mode;
        let worker = tokio::spawn(async move {
            run_job(job, connector.as_ref(), &gateway, &use_case, &worker_tx).await
        });
        tokio::spawn(async move {
            let report = match worker.await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "batch worker died");
                    let reason = format!("Worker failed: {}", e);
                    tx.error(&format!("❌ {}", reason));
                    BatchReport::halted(mode, reason)
                }
            };
            let _ = tx.send(WorkerEvent::Finished(report));
        });
        Ok(rx)
    }

    /// Feed every received event through here; completion clears the busy flag.
    pub fn observe(&mut self, event: &WorkerEvent) {
        if let WorkerEvent::Finished(_) = event {
            self.busy = false;
        }
    }

    /// Close the remote connection, if one was opened.
    pub async fn disconnect(&self) {
        if let Some(gateway) = self.gateway.lock().await.take() {
            match gateway.disconnect().await {
                Ok(()) => info!(remote = %gateway.describe(), "disconnected"),
                Err(e) => error!(error = %e, "disconnect failed"),
            }
        }
    }
}

async fn run_job(
    job: Job,
    connector: &dyn GatewayConnector,
    gateway_slot: &Mutex<Option<Arc<dyn TransferGateway>>>,
    use_case: &Mutex<IngestUseCase>,
    tx: &UnboundedSender<WorkerEvent>,
) -> BatchReport {
    let gateway = {
        let mut slot = gateway_slot.lock().await;
        match slot.as_ref() {
            Some(gateway) => gateway.clone(),
            None => match connector.connect(tx).await {
                Ok(gateway) => {
                    *slot = Some(gateway.clone());
                    gateway
                }
                Err(e) => {
                    error!(error = %e, "connection failed");
                    let reason = format!("Connection failed: {}", e);
                    tx.error(&format!("❌ {}", reason));
                    return BatchReport::halted(job.mode, reason);
                }
            },
        }
    };

    let mut use_case = use_case.lock().await;
    use_case
        .run(gateway.as_ref(), job.mode, job.selection, job.filter.as_deref(), tx)
        .await
}
