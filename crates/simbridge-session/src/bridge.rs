//! Async command bridge
//!
//! The only component the control surface talks to. Every backend call is
//! queued onto one dedicated worker thread that owns the [`BackendSession`],
//! so concurrent dispatches are serialized in issuance order and the caller's
//! runtime never blocks. Log and console lines travel back over an explicit
//! channel drained by a task on the caller's own runtime.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use simbridge_core::prelude::*;

use crate::capability::{Backend, ConsoleOutput};
use crate::session::BackendSession;

/// Depth of the worker's operation queue.
const OP_QUEUE_DEPTH: usize = 32;

/// One in-flight command dispatched to the worker. Each variant carries its
/// completion handle; the worker's reply is observed exactly once by the
/// issuing caller, or dropped if the caller lost interest.
enum Operation {
    Load {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Start {
        reply: oneshot::Sender<Result<()>>,
    },
    Pause {
        reply: oneshot::Sender<Result<()>>,
    },
    Reset {
        reply: oneshot::Sender<Result<()>>,
    },
    ReadMemory {
        addr: u64,
        width: u8,
        reply: oneshot::Sender<Result<u64>>,
    },
    Command {
        text: String,
        reply: oneshot::Sender<Result<ConsoleOutput>>,
    },
    SetupLogging {
        lines: mpsc::UnboundedSender<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Cleanup {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Async façade over one [`BackendSession`].
///
/// Operations are not cancellable once dispatched: the worker runs every
/// dequeued backend call to completion. Dropping a returned future discards
/// the result but never aborts the call.
pub struct CommandBridge {
    op_tx: mpsc::Sender<Operation>,
    running: Arc<AtomicBool>,
}

impl CommandBridge {
    /// Wrap the injected backend handle in a session and spawn its worker.
    pub fn new(backend: Box<dyn Backend>) -> Result<Self> {
        let session = BackendSession::new(backend);
        let running = session.running_flag();

        let (op_tx, op_rx) = mpsc::channel(OP_QUEUE_DEPTH);
        // Detached on purpose: the worker exits on its own once the queue
        // closes, running a final cleanup first.
        let _ = thread::Builder::new()
            .name("backend-worker".to_string())
            .spawn(move || worker_loop(session, op_rx))?;

        Ok(Self { op_tx, running })
    }

    /// Queue one operation and await its completion handle.
    async fn dispatch<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Operation,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.op_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| Error::channel_send("backend worker queue"))?;
        reply_rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Load the backend script at `path`.
    pub async fn load(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.dispatch(|reply| Operation::Load { path, reply }).await
    }

    /// Start the simulation.
    pub async fn start(&self) -> Result<()> {
        self.dispatch(|reply| Operation::Start { reply }).await
    }

    /// Pause the simulation.
    pub async fn pause(&self) -> Result<()> {
        self.dispatch(|reply| Operation::Pause { reply }).await
    }

    /// Reset the simulation.
    pub async fn reset(&self) -> Result<()> {
        self.dispatch(|reply| Operation::Reset { reply }).await
    }

    /// Read the `width`-byte value at `addr` without mutating backend state.
    pub async fn read_memory(&self, addr: u64, width: u8) -> Result<u64> {
        self.dispatch(|reply| Operation::ReadMemory { addr, width, reply })
            .await
    }

    /// Execute arbitrary console text and return the captured stream pair.
    /// Output produced before a failure is still delivered via the log
    /// channel.
    pub async fn send_command(&self, text: impl Into<String>) -> Result<ConsoleOutput> {
        let text = text.into();
        self.dispatch(|reply| Operation::Command { text, reply })
            .await
    }

    /// Register `callback` to receive every log and console line this session
    /// produces from now on, in production order.
    ///
    /// The hand-off is an explicit channel: the worker and the tailer send
    /// lines into it, and a task spawned on the caller's runtime drains it
    /// and invokes the callback there. The callback never runs on a backend
    /// thread.
    pub async fn setup_logging<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(String) + Send + 'static,
    {
        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                callback(line);
            }
            debug!("log delivery task finished");
        });

        self.dispatch(|reply| Operation::SetupLogging {
            lines: line_tx,
            reply,
        })
        .await
    }

    /// Release session resources. Idempotent; also runs automatically when
    /// the bridge is dropped.
    pub async fn cleanup(&self) -> Result<()> {
        self.dispatch(|reply| Operation::Cleanup { reply }).await
    }

    /// Whether the most recently completed control operation left the
    /// simulation running. Meaningful once the corresponding operation's
    /// future has resolved.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Worker loop: executes at most one backend call at a time, in issuance
/// order. Reply send failures are ignored — the caller may have discarded
/// its handle, which does not abort the call.
fn worker_loop(mut session: BackendSession, mut op_rx: mpsc::Receiver<Operation>) {
    while let Some(op) = op_rx.blocking_recv() {
        match op {
            Operation::Load { path, reply } => {
                let _ = reply.send(session.load_script(&path));
            }
            Operation::Start { reply } => {
                let _ = reply.send(session.start());
            }
            Operation::Pause { reply } => {
                let _ = reply.send(session.pause());
            }
            Operation::Reset { reply } => {
                let _ = reply.send(session.reset());
            }
            Operation::ReadMemory { addr, width, reply } => {
                let _ = reply.send(session.read_memory(addr, width));
            }
            Operation::Command { text, reply } => {
                let _ = reply.send(session.execute_command(&text));
            }
            Operation::SetupLogging { lines, reply } => {
                let _ = reply.send(session.setup_logging(lines));
            }
            Operation::Cleanup { reply } => {
                session.cleanup();
                let _ = reply.send(Ok(()));
            }
        }
    }

    // Queue closed: the bridge was dropped. Release whatever is still held
    // so no temporary file outlives the session.
    session.cleanup();
    debug!("backend worker exiting");
}
