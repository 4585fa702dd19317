//! Substitute backend used when the real simulator cannot be constructed
//!
//! Reproduces the latency and failure characteristics of the console backend
//! closely enough that caller logic which depends on timing or error paths
//! behaves the same as in production. It has no log source of its own, so a
//! redirected log file simply stays empty.

use std::path::Path;
use std::thread;
use std::time::Duration;

use simbridge_core::prelude::*;

use crate::capability::{read_directive, Backend, ConsoleOutput};

/// Fixed value returned for every memory read in substitute mode.
///
/// This is a documented placeholder, not real data — callers must not attach
/// meaning to it beyond "the read path works end to end".
pub const PLACEHOLDER_READ_VALUE: u64 = 0xDEAD_BEEF;

const LOAD_DELAY: Duration = Duration::from_millis(500);
const START_DELAY: Duration = Duration::from_millis(200);
const PAUSE_DELAY: Duration = Duration::from_millis(100);
const RESET_DELAY: Duration = Duration::from_millis(500);
const READ_DELAY: Duration = Duration::from_millis(10);
const COMMAND_DELAY: Duration = Duration::from_millis(50);

/// Behaviorally-equivalent stand-in for the real backend.
#[derive(Debug, Default)]
pub struct SubstituteBackend;

impl SubstituteBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for SubstituteBackend {
    fn load_script(&mut self, path: &Path) -> Result<ConsoleOutput> {
        thread::sleep(LOAD_DELAY);
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("empty script path"));
        }
        Ok(ConsoleOutput::new("Script loaded successfully", ""))
    }

    fn start(&mut self) -> Result<ConsoleOutput> {
        thread::sleep(START_DELAY);
        Ok(ConsoleOutput::new("Simulation started", ""))
    }

    fn pause(&mut self) -> Result<ConsoleOutput> {
        thread::sleep(PAUSE_DELAY);
        Ok(ConsoleOutput::new("Simulation paused", ""))
    }

    fn reset(&mut self) -> Result<ConsoleOutput> {
        thread::sleep(RESET_DELAY);
        Ok(ConsoleOutput::new("Simulation reset", ""))
    }

    fn read_memory(&mut self, _addr: u64, width: u8) -> Result<u64> {
        read_directive(width)?;
        thread::sleep(READ_DELAY);
        Ok(PLACEHOLDER_READ_VALUE)
    }

    fn execute(&mut self, command: &str) -> Result<ConsoleOutput> {
        thread::sleep(COMMAND_DELAY);
        trace!("substitute console ignored: {}", command);
        Ok(ConsoleOutput::default())
    }

    fn redirect_log(&mut self, path: &Path) -> Result<()> {
        // Accepted, but nothing will ever be written: there is no backend
        // log source in substitute mode.
        debug!("substitute backend accepted log path {}", path.display());
        Ok(())
    }

    fn shutdown(&mut self) {}

    fn name(&self) -> &'static str {
        "substitute"
    }
}
