//! Backend session lifecycle
//!
//! One `BackendSession` binds one backend handle to its owned resources: the
//! running flag, the log line channel and the active log tailer. It is owned
//! and driven exclusively by the bridge's worker thread; no other thread of
//! control calls into the backend.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use simbridge_core::prelude::*;

use crate::capability::{Backend, ConsoleOutput};
use crate::tailer::LogTailer;

/// One lifecycle instance of a backend handle plus its owned resources.
pub struct BackendSession {
    backend: Box<dyn Backend>,
    /// True only after the most recently completed control operation left the
    /// simulation running. Written with Release ordering after confirmed
    /// success; the bridge reads it with Acquire after the matching reply.
    running: Arc<AtomicBool>,
    log_tx: Option<UnboundedSender<String>>,
    tailer: Option<LogTailer>,
}

impl BackendSession {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        info!("backend session created ({})", backend.name());
        Self {
            backend,
            running: Arc::new(AtomicBool::new(false)),
            log_tx: None,
            tailer: None,
        }
    }

    /// Shared handle to the running flag, mirrored by the bridge.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Path of the active log file, if logging is set up.
    pub fn log_path(&self) -> Option<&Path> {
        self.tailer.as_ref().map(|t| t.path())
    }

    /// Send one line through the registered log channel, if any.
    fn emit(&self, line: impl Into<String>) {
        if let Some(tx) = &self.log_tx {
            let _ = tx.send(line.into());
        }
    }

    /// Echo both captured streams through the log channel.
    fn emit_streams(&self, reply: &ConsoleOutput) {
        for line in reply.output.lines() {
            self.emit(line);
        }
        for line in reply.error.lines() {
            self.emit(format!("error: {}", line));
        }
    }

    /// Echo the streams, then surface a non-empty error stream as
    /// [`Error::Backend`]. The echo happens first so failures stay visible in
    /// the log even when the caller only sees the error.
    fn check(&self, reply: ConsoleOutput) -> Result<ConsoleOutput> {
        self.emit_streams(&reply);
        if reply.is_err() {
            return Err(Error::backend(reply.error));
        }
        Ok(reply)
    }

    /// Clear prior state and execute the script at `path`.
    pub fn load_script(&mut self, path: &Path) -> Result<()> {
        info!("loading script: {}", path.display());
        self.emit(format!("> include @{}", path.display()));
        let reply = self.backend.load_script(path)?;
        self.check(reply)?;
        info!("script loaded successfully");
        Ok(())
    }

    /// Start the simulation. `running` flips to true only on success.
    pub fn start(&mut self) -> Result<()> {
        self.emit("> start");
        let reply = self.backend.start()?;
        self.check(reply)?;
        self.running.store(true, Ordering::Release);
        info!("simulation started");
        Ok(())
    }

    /// Pause the simulation. `running` flips to false only on success.
    pub fn pause(&mut self) -> Result<()> {
        self.emit("> pause");
        let reply = self.backend.pause()?;
        self.check(reply)?;
        self.running.store(false, Ordering::Release);
        info!("simulation paused");
        Ok(())
    }

    /// Reset the simulation. `running` flips to false only on success.
    pub fn reset(&mut self) -> Result<()> {
        self.emit("> reset");
        let reply = self.backend.reset()?;
        self.check(reply)?;
        self.running.store(false, Ordering::Release);
        info!("simulation reset");
        Ok(())
    }

    /// Read the `width`-byte value at `addr`. No state is mutated and nothing
    /// is echoed: memory watches poll this too often for log traffic.
    pub fn read_memory(&mut self, addr: u64, width: u8) -> Result<u64> {
        self.backend.read_memory(addr, width)
    }

    /// Execute arbitrary console text. Both streams are echoed regardless of
    /// success; a non-empty error stream is surfaced after the echo.
    pub fn execute_command(&mut self, command: &str) -> Result<ConsoleOutput> {
        self.emit(format!("> {}", command));
        let reply = self.backend.execute(command)?;
        self.check(reply)
    }

    /// Create the session log file, point the backend at it and start the
    /// tailer feeding `lines`.
    ///
    /// At most one log stream is live per session: a repeated call stops the
    /// previous tailer (removing its file) before starting the replacement.
    pub fn setup_logging(&mut self, lines: UnboundedSender<String>) -> Result<()> {
        if let Some(previous) = self.tailer.take() {
            debug!("replacing active log stream");
            previous.stop();
        }

        let path = create_log_file()?;
        if let Err(e) = self.backend.redirect_log(&path) {
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        let tailer = match LogTailer::spawn(path.clone(), lines.clone()) {
            Ok(tailer) => tailer,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        };

        self.tailer = Some(tailer);
        self.log_tx = Some(lines);
        info!("session logging set up at {}", path.display());
        Ok(())
    }

    /// Release session resources: stop the tailer (which removes its file)
    /// and shut the backend down. Idempotent and safe after partial failure.
    pub fn cleanup(&mut self) {
        if let Some(tailer) = self.tailer.take() {
            tailer.stop();
        }
        self.log_tx = None;
        self.backend.shutdown();
        self.running.store(false, Ordering::Release);
        debug!("session cleaned up");
    }
}

/// Create an empty session-scoped temporary log file and keep it on disk;
/// removal is the tailer's job.
fn create_log_file() -> Result<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix("simbridge-")
        .suffix(".log")
        .tempfile()?;
    file.into_temp_path()
        .keep()
        .map_err(|e| Error::Io(e.error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substitute::SubstituteBackend;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn substitute_session() -> BackendSession {
        BackendSession::new(Box::new(SubstituteBackend::new()))
    }

    #[test]
    fn test_running_follows_control_outcomes() {
        let mut session = substitute_session();
        let running = session.running_flag();

        assert!(!running.load(Ordering::Acquire));

        session.start().unwrap();
        assert!(running.load(Ordering::Acquire));

        session.pause().unwrap();
        assert!(!running.load(Ordering::Acquire));

        session.start().unwrap();
        session.reset().unwrap();
        assert!(!running.load(Ordering::Acquire));
    }

    #[test]
    fn test_running_unchanged_on_failed_load() {
        let mut session = substitute_session();
        let running = session.running_flag();

        let err = session.load_script(Path::new("")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(!running.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_setup_logging_replaces_previous_stream() {
        let mut session = substitute_session();

        let (tx1, _rx1) = mpsc::unbounded_channel();
        session.setup_logging(tx1).unwrap();
        let first_path = session.log_path().unwrap().to_path_buf();

        let (tx2, _rx2) = mpsc::unbounded_channel();
        session.setup_logging(tx2).unwrap();
        let second_path = session.log_path().unwrap().to_path_buf();

        assert_ne!(first_path, second_path);
        assert!(!first_path.exists(), "previous log file must be removed");
        assert!(second_path.exists());

        session.cleanup();
        assert!(!second_path.exists());
    }

    #[tokio::test]
    async fn test_command_echo_reaches_log_channel() {
        let mut session = substitute_session();
        let (tx, mut rx) = mpsc::unbounded_channel();
        session.setup_logging(tx).unwrap();

        session.start().unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, "> start");
        let second = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, "Simulation started");

        session.cleanup();
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let mut session = substitute_session();
        let (tx, _rx) = mpsc::unbounded_channel();
        session.setup_logging(tx).unwrap();
        let path = session.log_path().unwrap().to_path_buf();

        session.cleanup();
        session.cleanup();
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_without_logging_is_safe() {
        let mut session = substitute_session();
        session.cleanup();
    }
}
