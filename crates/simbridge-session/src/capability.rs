//! The uniform capability surface implemented by every backend

use std::path::Path;

use simbridge_core::prelude::*;

/// Captured (output, error) stream pair from one console interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub output: String,
    pub error: String,
}

impl ConsoleOutput {
    pub fn new(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: error.into(),
        }
    }

    /// A non-empty error stream means the backend rejected the request.
    pub fn is_err(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Blocking capability surface shared by the real and substitute backends.
///
/// Every method performs a genuinely blocking call and must only be invoked
/// from the session's dedicated worker thread — the backend console is not
/// safe to drive from more than one thread of control. A [`BackendSession`]
/// holds exactly one implementation, chosen once at construction by the
/// factory and never swapped afterwards.
///
/// [`BackendSession`]: crate::session::BackendSession
pub trait Backend: Send + std::fmt::Debug {
    /// Clear any prior state and execute the script at `path`.
    fn load_script(&mut self, path: &Path) -> Result<ConsoleOutput>;

    /// Start the simulation.
    fn start(&mut self) -> Result<ConsoleOutput>;

    /// Pause the simulation.
    fn pause(&mut self) -> Result<ConsoleOutput>;

    /// Reset the simulation to a pristine state.
    fn reset(&mut self) -> Result<ConsoleOutput>;

    /// Read the `width`-byte value at `addr`. Side-effect free.
    ///
    /// `width` must be 1, 2, 4 or 8; anything else is an
    /// [`Error::InvalidArgument`].
    fn read_memory(&mut self, addr: u64, width: u8) -> Result<u64>;

    /// Execute arbitrary console text and capture both streams.
    fn execute(&mut self, command: &str) -> Result<ConsoleOutput>;

    /// Direct the backend to append its structured log to the file at `path`.
    fn redirect_log(&mut self, path: &Path) -> Result<()>;

    /// Release backend resources. Must be idempotent.
    fn shutdown(&mut self);

    /// Short human-readable implementation name, used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Validate a memory read width and name the matching console read directive.
pub(crate) fn read_directive(width: u8) -> Result<&'static str> {
    match width {
        1 => Ok("ReadByte"),
        2 => Ok("ReadWord"),
        4 => Ok("ReadDoubleWord"),
        8 => Ok("ReadQuadWord"),
        other => Err(Error::invalid_argument(format!(
            "unsupported read width: {} (expected 1, 2, 4 or 8)",
            other
        ))),
    }
}
