//! Session log tailing
//!
//! A dedicated thread reads newly appended lines from the session's temporary
//! log file and forwards each one into the line channel the bridge drains.
//! The thread never touches caller state; marshaling the lines onto the
//! caller's runtime is the bridge's job.
//!
//! Lifecycle: Idle -> Active (thread running) -> Stopping (flag raised) ->
//! Stopped (thread joined, file removed best-effort).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use simbridge_core::prelude::*;

/// Fixed polling interval of the read loop.
///
/// Deliberately a plain bounded poll rather than file-change notification;
/// tests rely on its timing being deterministic.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long `stop` waits for the read loop to acknowledge the stop signal.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Tails one session-scoped temporary file and owns its lifecycle.
pub struct LogTailer {
    path: PathBuf,
    stop: Arc<AtomicBool>,
    done_rx: std_mpsc::Receiver<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl LogTailer {
    /// Start tailing `path`, forwarding each complete line into `lines`.
    ///
    /// The file is read from its start, not seeked to the end, so lines
    /// written between file creation and thread start are not lost.
    pub fn spawn(path: PathBuf, lines: UnboundedSender<String>) -> Result<Self> {
        let file = File::open(&path)?;

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = std_mpsc::channel();

        let loop_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("log-tailer".to_string())
            .spawn(move || {
                read_loop(file, lines, loop_stop);
                let _ = done_tx.send(());
            })?;

        debug!("log tailer started on {}", path.display());

        Ok(Self {
            path,
            stop,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Path of the tailed temporary file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raise the stop signal, wait a bounded grace for the read loop to exit,
    /// then remove the temporary file. A missing file is not an error.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Release);

        match self.done_rx.recv_timeout(STOP_GRACE) {
            Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
            // Proceed to file removal regardless; the loop will still exit on
            // its next poll and the thread detaches.
            Err(_) => warn!("log tailer did not stop within {:?}", STOP_GRACE),
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("failed to remove {}: {}", self.path.display(), e);
            }
        }

        debug!("log tailer stopped");
    }
}

/// Bounded-polling read loop.
///
/// Reads to the current EOF, sleeps one interval, repeats. A line is only
/// delivered once its terminator has been written; a partial tail is rewound
/// and retried on the next poll.
fn read_loop(file: File, lines: UnboundedSender<String>, stop: Arc<AtomicBool>) {
    let mut reader = BufReader::new(file);

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => thread::sleep(POLL_INTERVAL),
            Ok(n) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                    if lines.send(line).is_err() {
                        // Receiver gone: nobody is listening anymore.
                        break;
                    }
                } else {
                    // Writer is mid-append; rewind and try again next poll.
                    if reader.seek_relative(-(n as i64)).is_err() {
                        break;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
            Err(e) => {
                debug!("log tailer read error: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    fn temp_log() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        File::create(&path).unwrap();
        (dir, path)
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    #[tokio::test]
    async fn test_three_appended_lines_arrive_in_order() {
        let (_dir, path) = temp_log();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path.clone(), tx).unwrap();

        append(&path, "first\n");
        append(&path, "second\n");
        append(&path, "third\n");

        for expected in ["first", "second", "third"] {
            let line = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(line, expected);
        }

        tailer.stop();
        assert!(rx.try_recv().is_err(), "no duplicate lines expected");
    }

    #[tokio::test]
    async fn test_lines_written_before_thread_start_are_not_lost() {
        let (_dir, path) = temp_log();
        append(&path, "early bird\n");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path, tx).unwrap();

        let line = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, "early bird");

        tailer.stop();
    }

    #[tokio::test]
    async fn test_partial_line_is_held_until_terminated() {
        let (_dir, path) = temp_log();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path.clone(), tx).unwrap();

        append(&path, "incompl");
        tokio::time::sleep(POLL_INTERVAL * 3).await;
        assert!(rx.try_recv().is_err(), "partial line must not be delivered");

        append(&path, "ete\n");
        let line = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, "incomplete");

        tailer.stop();
    }

    #[tokio::test]
    async fn test_crlf_terminator_is_stripped() {
        let (_dir, path) = temp_log();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path.clone(), tx).unwrap();

        append(&path, "windows line\r\n");
        let line = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line, "windows line");

        tailer.stop();
    }

    #[tokio::test]
    async fn test_stop_removes_file() {
        let (_dir, path) = temp_log();
        let (tx, _rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path.clone(), tx).unwrap();

        tailer.stop();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stop_tolerates_already_removed_file() {
        let (_dir, path) = temp_log();
        let (tx, _rx) = mpsc::unbounded_channel();
        let tailer = LogTailer::spawn(path.clone(), tx).unwrap();

        std::fs::remove_file(&path).unwrap();
        tailer.stop();
    }
}
