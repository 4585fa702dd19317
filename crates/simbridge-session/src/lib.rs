//! # simbridge-session - Backend Session Management
//!
//! Manages simulation backend sessions: the blocking capability surface, the
//! dedicated worker thread that serializes every backend call, and the log
//! tailing that streams backend output back to the caller's runtime.
//!
//! Depends on [`simbridge_core`] for error handling.
//!
//! ## Public API
//!
//! ### Command Bridge
//! - [`CommandBridge`] - Async façade; the only type the control surface uses
//!
//! ### Backends
//! - [`Backend`] - Blocking capability surface (load/start/pause/reset/
//!   read-memory/execute/redirect-log/shutdown)
//! - [`ConsoleBackend`] - Real backend driving the simulator monitor console
//! - [`SubstituteBackend`] - Stand-in used when the simulator is unavailable
//! - [`create_backend()`] - Factory resolving [`BackendKind`] exactly once
//!
//! ### Session Internals
//! - [`BackendSession`] - One backend handle plus its owned resources
//! - [`LogTailer`] - Polling reader of the session's temporary log file
//!
//! ### Configuration
//! - [`BridgeConfig`] - Construction-time settings (.simbridge/config.toml)
//! - [`parse_sys_bus_params()`] - CLI `key=value,...` parameter parsing

pub mod bridge;
pub mod capability;
pub mod config;
pub mod console;
pub mod factory;
pub mod session;
pub mod substitute;
pub mod tailer;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use bridge::CommandBridge;
pub use capability::{Backend, ConsoleOutput};
pub use config::{parse_sys_bus_params, BridgeConfig};
pub use console::ConsoleBackend;
pub use factory::{create_backend, BackendKind};
pub use session::BackendSession;
pub use substitute::SubstituteBackend;
pub use tailer::LogTailer;
