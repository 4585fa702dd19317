//! Application error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Caller Errors
    // ─────────────────────────────────────────────────────────────
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    // ─────────────────────────────────────────────────────────────
    // Backend Errors
    // ─────────────────────────────────────────────────────────────
    /// The backend accepted a well-formed request and reported a non-empty
    /// error. The message carries the backend's error text verbatim.
    #[error("backend error: {message}")]
    Backend { message: String },

    #[error("backend binary not found. Ensure it is in your PATH.")]
    BackendNotFound,

    #[error("failed to spawn backend process: {reason}")]
    ProcessSpawn { reason: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("channel send error: {message}")]
    ChannelSend { message: String },

    #[error("channel closed unexpectedly")]
    ChannelClosed,

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("configuration error: {message}")]
    Config { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn process_spawn(reason: impl Into<String>) -> Self {
        Self::ProcessSpawn {
            reason: reason.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. } | Error::Backend { .. } | Error::ChannelSend { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::BackendNotFound | Error::ProcessSpawn { .. } | Error::ChannelClosed
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::backend("LoadELF: could not find file");
        assert_eq!(
            err.to_string(),
            "backend error: LoadELF: could not find file"
        );

        let err = Error::BackendNotFound;
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_backend_error_preserves_text_verbatim() {
        let raw = "There was an error executing command 'i @missing.resc'";
        let err = Error::backend(raw);
        match err {
            Error::Backend { message } => assert_eq!(message, raw),
            other => panic!("expected Backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::BackendNotFound.is_fatal());
        assert!(Error::process_spawn("permission denied").is_fatal());
        assert!(!Error::backend("test").is_fatal());
    }

    #[test]
    fn test_error_is_recoverable() {
        assert!(Error::backend("test").is_recoverable());
        assert!(Error::invalid_argument("empty path").is_recoverable());
        assert!(!Error::BackendNotFound.is_recoverable());
    }

    #[test]
    fn test_error_constructors() {
        let _ = Error::invalid_argument("test");
        let _ = Error::backend("test");
        let _ = Error::process_spawn("test");
        let _ = Error::channel_send("test");
        let _ = Error::config("test");
    }
}
