// ABOUTME: EventLoopBridge lets blocking callers run async operations on one persistent worker.
// ABOUTME: The worker owns a current-thread tokio runtime on a dedicated thread fed by a job channel.

use once_cell::sync::OnceCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, ThreadId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures of the bridge itself, never of the submitted operation
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge worker is not running")]
    WorkerUnavailable,

    #[error("failed to spawn bridge worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("failed to build bridge runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),

    #[error("operation was aborted before it produced a result")]
    OperationAborted,

    #[error("run_blocking called from the bridge worker thread")]
    Reentrant,
}

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Commands sent to the bridge worker thread
enum WorkerCommand {
    Run(Job),
    Shutdown,
}

/// Handle to a single long-lived background worker.
///
/// Each submission is spawned as a task on the worker's cooperative
/// scheduler, so submissions from one caller run in order (the caller blocks
/// between them) while submissions from concurrent callers interleave. The
/// worker thread is detached and never keeps the process alive.
pub struct EventLoopBridge {
    tx: mpsc::UnboundedSender<WorkerCommand>,
    worker_thread: ThreadId,
    name: String,
}

impl EventLoopBridge {
    /// Start a worker thread named `<name>-bridge`
    pub fn spawn(name: &str) -> Result<Self, BridgeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BridgeError::RuntimeBuild)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_name = name.to_string();
        let handle = thread::Builder::new()
            .name(format!("{}-bridge", name))
            .spawn(move || run_worker(worker_name, runtime, rx))
            .map_err(BridgeError::WorkerSpawn)?;

        tracing::debug!(bridge = %name, "Bridge worker started");

        Ok(Self {
            tx,
            worker_thread: handle.thread().id(),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Thread id of the worker that runs every submission
    pub fn worker_thread_id(&self) -> ThreadId {
        self.worker_thread
    }

    /// Run `operation` on the worker and block until it completes.
    ///
    /// Fails with [`BridgeError::Reentrant`] on the worker thread itself,
    /// where blocking would deadlock, and with
    /// [`BridgeError::OperationAborted`] if the operation panicked.
    pub fn block_on<F>(&self, operation: F) -> Result<F::Output, BridgeError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if thread::current().id() == self.worker_thread {
            return Err(BridgeError::Reentrant);
        }

        let (reply_tx, reply_rx) = std_mpsc::sync_channel(1);
        let job: Job = Box::pin(async move {
            let output = operation.await;
            let _ = reply_tx.send(output);
        });

        self.tx
            .send(WorkerCommand::Run(job))
            .map_err(|_| BridgeError::WorkerUnavailable)?;

        reply_rx.recv().map_err(|_| {
            tracing::error!(bridge = %self.name, "Bridge operation dropped its reply");
            BridgeError::OperationAborted
        })
    }

    /// Run a fallible operation and hand back its own result.
    ///
    /// The operation's error reaches the caller unchanged; bridge failures
    /// are converted into the caller's error type.
    pub fn run_blocking<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        self.block_on(operation)?
    }

    /// Ask the worker to stop after the commands already queued.
    ///
    /// Operations still running are dropped and their callers see
    /// [`BridgeError::OperationAborted`].
    pub fn shutdown(&self) {
        let _ = self.tx.send(WorkerCommand::Shutdown);
    }
}

fn run_worker(
    name: String,
    runtime: tokio::runtime::Runtime,
    mut rx: mpsc::UnboundedReceiver<WorkerCommand>,
) {
    runtime.block_on(async {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WorkerCommand::Run(job) => {
                    tokio::spawn(job);
                }
                WorkerCommand::Shutdown => {
                    tracing::info!(bridge = %name, "Bridge worker shutting down");
                    break;
                }
            }
        }
    });
    tracing::debug!(bridge = %name, "Bridge worker exited");
}

/// A bridge whose worker is started on first use.
///
/// Concurrent first calls race safely: exactly one worker is created.
pub struct LazyBridge {
    name: String,
    cell: OnceCell<EventLoopBridge>,
}

impl LazyBridge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
        }
    }

    /// Whether the worker has been created yet
    pub fn is_started(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The worker, starting it if needed
    pub fn get(&self) -> Result<&EventLoopBridge, BridgeError> {
        self.cell.get_or_try_init(|| EventLoopBridge::spawn(&self.name))
    }

    /// See [`EventLoopBridge::run_blocking`]
    pub fn run_blocking<F, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<BridgeError> + Send + 'static,
    {
        self.get()?.run_blocking(operation)
    }
}
