//! Test utilities for session types
//!
//! Provides a scripted fake backend that records every call, asserts
//! non-reentrant entry and can inject failures on a named operation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use simbridge_core::prelude::*;

use crate::capability::{read_directive, Backend, ConsoleOutput};

/// Observation side of a [`FakeBackend`], usable after the backend has been
/// boxed and moved into a session.
#[derive(Clone)]
pub struct FakeProbe {
    calls: Arc<Mutex<Vec<&'static str>>>,
    overlap: Arc<AtomicBool>,
}

impl FakeProbe {
    /// Operation names in the order the backend executed them.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("probe lock poisoned").clone()
    }

    /// True if any operation entered the backend while another was running.
    pub fn overlap_detected(&self) -> bool {
        self.overlap.load(Ordering::Acquire)
    }
}

/// Recording backend that fails the test contract if entered reentrantly.
#[derive(Debug)]
pub struct FakeBackend {
    calls: Arc<Mutex<Vec<&'static str>>>,
    in_call: Arc<AtomicBool>,
    overlap: Arc<AtomicBool>,
    delay: Duration,
    fail_on: Option<&'static str>,
}

impl FakeBackend {
    /// Error text injected by [`FakeBackend::failing_on`].
    pub const INJECTED_ERROR: &'static str = "injected backend failure";

    /// Backend whose every operation holds the "console" for `delay`.
    pub fn with_delay(delay: Duration) -> (Self, FakeProbe) {
        Self::build(delay, None)
    }

    /// Backend whose operation named `op` reports a non-empty error stream.
    pub fn failing_on(op: &'static str) -> (Self, FakeProbe) {
        Self::build(Duration::ZERO, Some(op))
    }

    fn build(delay: Duration, fail_on: Option<&'static str>) -> (Self, FakeProbe) {
        let backend = Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            in_call: Arc::new(AtomicBool::new(false)),
            overlap: Arc::new(AtomicBool::new(false)),
            delay,
            fail_on,
        };
        let probe = FakeProbe {
            calls: Arc::clone(&backend.calls),
            overlap: Arc::clone(&backend.overlap),
        };
        (backend, probe)
    }

    /// Record one operation, holding the non-reentrancy guard for `delay`.
    fn enter(&self, op: &'static str) -> ConsoleOutput {
        if self.in_call.swap(true, Ordering::AcqRel) {
            self.overlap.store(true, Ordering::Release);
        }
        self.calls.lock().expect("calls lock poisoned").push(op);
        thread::sleep(self.delay);
        self.in_call.store(false, Ordering::Release);

        if self.fail_on == Some(op) {
            ConsoleOutput::new("", Self::INJECTED_ERROR)
        } else {
            ConsoleOutput::default()
        }
    }
}

impl Backend for FakeBackend {
    fn load_script(&mut self, path: &Path) -> Result<ConsoleOutput> {
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("empty script path"));
        }
        Ok(self.enter("load_script"))
    }

    fn start(&mut self) -> Result<ConsoleOutput> {
        Ok(self.enter("start"))
    }

    fn pause(&mut self) -> Result<ConsoleOutput> {
        Ok(self.enter("pause"))
    }

    fn reset(&mut self) -> Result<ConsoleOutput> {
        Ok(self.enter("reset"))
    }

    fn read_memory(&mut self, addr: u64, width: u8) -> Result<u64> {
        read_directive(width)?;
        let reply = self.enter("read_memory");
        if reply.is_err() {
            return Err(Error::backend(reply.error));
        }
        Ok(addr)
    }

    fn execute(&mut self, command: &str) -> Result<ConsoleOutput> {
        let reply = self.enter("execute");
        if reply.is_err() {
            return Ok(reply);
        }
        Ok(ConsoleOutput::new(format!("echo: {}", command), ""))
    }

    fn redirect_log(&mut self, _path: &Path) -> Result<()> {
        self.enter("redirect_log");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.enter("shutdown");
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_records_calls_in_order() {
        let (mut backend, probe) = FakeBackend::with_delay(Duration::ZERO);
        backend.start().unwrap();
        backend.pause().unwrap();
        assert_eq!(probe.calls(), vec!["start", "pause"]);
        assert!(!probe.overlap_detected());
    }

    #[test]
    fn test_fake_injects_failure_on_named_op() {
        let (mut backend, _probe) = FakeBackend::failing_on("pause");
        assert!(!backend.start().unwrap().is_err());
        assert!(backend.pause().unwrap().is_err());
    }
}
