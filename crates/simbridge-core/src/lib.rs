//! # simbridge-core - Core Domain Types
//!
//! Foundation crate for simbridge. Provides error handling and tracing setup
//! shared by every other crate in the workspace.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (thiserror, tracing, dirs).
//!
//! ## Public API
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Logging (`logging`)
//! - [`logging::init()`] - Set up the tracing subscriber (rolling file appender)
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use simbridge_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod prelude;

pub use error::{Error, Result, ResultExt};
