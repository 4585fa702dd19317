//! Console-driven simulator backend
//!
//! Drives the simulator binary through its interactive monitor console over
//! piped stdio. Every capability call writes one or more monitor directives
//! to stdin, then a sentinel `echo`, and collects stdout up to the sentinel.
//! Stderr is drained by a dedicated thread into a buffer that is taken once
//! per command as the error stream.
//!
//! All methods block; they are only ever invoked from the session worker.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;

use simbridge_core::prelude::*;

use crate::capability::{read_directive, Backend, ConsoleOutput};
use crate::config::BridgeConfig;

/// Counter feeding sentinel markers, unique per console interaction.
static SYNC_COUNTER: AtomicU64 = AtomicU64::new(1);

/// How long `shutdown` waits for the child to honor `quit` before killing it.
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Real backend speaking the simulator's monitor console protocol.
#[derive(Debug)]
pub struct ConsoleBackend {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_buf: Arc<Mutex<String>>,
    stderr_thread: Option<thread::JoinHandle<()>>,
    stopped: bool,
}

impl ConsoleBackend {
    /// Spawn the simulator binary in console mode and apply the configured
    /// system bus parameters.
    ///
    /// Fails with [`Error::BackendNotFound`] when the binary is not on `PATH`,
    /// which the factory turns into a substitute fallback.
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        let binary = which::which(&config.binary).map_err(|_| Error::BackendNotFound)?;

        info!(
            "spawning backend console: {} {}",
            binary.display(),
            config.args.join(" ")
        );

        let mut child = Command::new(&binary)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::process_spawn(e.to_string()))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::process_spawn("backend stdin was not captured")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::process_spawn("backend stdout was not captured")
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            Error::process_spawn("backend stderr was not captured")
        })?;

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let drain_buf = Arc::clone(&stderr_buf);
        let stderr_thread = thread::Builder::new()
            .name("console-stderr".to_string())
            .spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    trace!("backend stderr: {}", line);
                    if let Ok(mut buf) = drain_buf.lock() {
                        buf.push_str(&line);
                        buf.push('\n');
                    }
                }
                debug!("stderr drain finished");
            })?;

        let mut backend = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_buf,
            stderr_thread: Some(stderr_thread),
            stopped: false,
        };

        for (key, value) in &config.sys_bus_params {
            let reply = backend.exec(&format!("set {} \"{}\"", key, value))?;
            if reply.is_err() {
                backend.shutdown();
                return Err(Error::backend(reply.error));
            }
        }

        Ok(backend)
    }

    /// Execute one monitor directive and capture both streams.
    ///
    /// Output is everything the console prints between the directive and the
    /// sentinel echo. The error stream is whatever stderr accumulated while
    /// the directive ran.
    fn exec(&mut self, command: &str) -> Result<ConsoleOutput> {
        let marker = format!(
            "__simbridge_sync_{}__",
            SYNC_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        debug!("console <- {}", command);
        writeln!(self.stdin, "{}", command)?;
        writeln!(self.stdin, "echo {}", marker)?;
        self.stdin.flush()?;

        let mut output = String::new();
        loop {
            let mut line = String::new();
            let n = self.stdout.read_line(&mut line)?;
            if n == 0 {
                return Err(Error::backend("backend console closed unexpectedly"));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.contains(&marker) {
                break;
            }
            if !line.is_empty() {
                output.push_str(line);
                output.push('\n');
            }
        }

        // Stderr travels on its own pipe; the child wrote it before emitting
        // the sentinel, but the drain thread still needs a beat to append it.
        thread::sleep(Duration::from_millis(10));
        let error = match self.stderr_buf.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(_) => String::new(),
        };

        Ok(ConsoleOutput {
            output: output.trim_end().to_string(),
            error: error.trim_end().to_string(),
        })
    }

    /// Run a directive and map a non-empty error stream to `Error::Backend`.
    fn exec_checked(&mut self, command: &str) -> Result<ConsoleOutput> {
        let reply = self.exec(command)?;
        if reply.is_err() {
            return Err(Error::backend(reply.error));
        }
        Ok(reply)
    }
}

impl Backend for ConsoleBackend {
    fn load_script(&mut self, path: &Path) -> Result<ConsoleOutput> {
        self.exec_checked("Clear")?;
        self.exec(&format!("include @{}", path.display()))
    }

    fn start(&mut self) -> Result<ConsoleOutput> {
        self.exec("start")
    }

    fn pause(&mut self) -> Result<ConsoleOutput> {
        self.exec("pause")
    }

    fn reset(&mut self) -> Result<ConsoleOutput> {
        self.exec("Clear")
    }

    fn read_memory(&mut self, addr: u64, width: u8) -> Result<u64> {
        let directive = read_directive(width)?;
        let reply = self.exec_checked(&format!("sysbus {} {:#x}", directive, addr))?;
        parse_read_reply(&reply.output)
    }

    fn execute(&mut self, command: &str) -> Result<ConsoleOutput> {
        self.exec(command)
    }

    fn redirect_log(&mut self, path: &Path) -> Result<()> {
        self.exec_checked(&format!("logFile @{}", path.display()))?;
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        let _ = writeln!(self.stdin, "quit");
        let _ = self.stdin.flush();

        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    info!("backend console exited with status: {:?}", status);
                    break;
                }
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(50));
                }
                Ok(None) => {
                    warn!("backend ignored quit, killing process");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
                Err(e) => {
                    error!("error waiting for backend console: {}", e);
                    break;
                }
            }
        }

        // The child is gone, so the stderr pipe hit EOF and the drain is done.
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

impl Drop for ConsoleBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Parse the integer a read directive printed, hex or decimal.
///
/// The last match wins: the console may echo the directive (which contains
/// the queried address) before the value itself.
fn parse_read_reply(output: &str) -> Result<u64> {
    static VALUE_RE: OnceLock<Regex> = OnceLock::new();
    let re = VALUE_RE.get_or_init(|| {
        Regex::new(r"0x[0-9A-Fa-f]+|\d+").unwrap_or_else(|e| panic!("invalid regex: {e}"))
    });

    let candidate = re
        .find_iter(output)
        .last()
        .ok_or_else(|| Error::backend(format!("unparseable read reply: {:?}", output)))?
        .as_str();

    let parsed = match candidate.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => candidate.parse(),
    };
    parsed.map_err(|_| Error::backend(format!("unparseable read reply: {:?}", output)))
}
