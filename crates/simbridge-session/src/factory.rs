//! Backend selection, resolved exactly once at session construction
//!
//! The chosen handle is injected into the bridge; nothing consults a global
//! "backend available" flag afterwards.

use std::str::FromStr;

use serde::Deserialize;

use simbridge_core::prelude::*;

use crate::capability::Backend;
use crate::config::BridgeConfig;
use crate::console::ConsoleBackend;
use crate::substitute::SubstituteBackend;

/// Which backend implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Prefer the console backend, fall back to the substitute when the
    /// simulator binary cannot be found or spawned.
    #[default]
    Auto,
    /// Require the real console backend; construction fails when unavailable.
    Console,
    /// Force the substitute backend.
    Substitute,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "console" => Ok(Self::Console),
            "substitute" => Ok(Self::Substitute),
            other => Err(Error::invalid_argument(format!(
                "unknown backend kind: {} (expected auto, console or substitute)",
                other
            ))),
        }
    }
}

/// Construct the backend handle described by `config`.
pub fn create_backend(config: &BridgeConfig) -> Result<Box<dyn Backend>> {
    match config.backend {
        BackendKind::Substitute => {
            info!("using substitute backend (forced by configuration)");
            Ok(Box::new(SubstituteBackend::new()))
        }
        BackendKind::Console => Ok(Box::new(ConsoleBackend::spawn(config)?)),
        BackendKind::Auto => match ConsoleBackend::spawn(config) {
            Ok(backend) => Ok(Box::new(backend)),
            Err(Error::BackendNotFound) | Err(Error::ProcessSpawn { .. }) => {
                warn!(
                    "backend binary '{}' unavailable, falling back to substitute backend",
                    config.binary
                );
                Ok(Box::new(SubstituteBackend::new()))
            }
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!(BackendKind::from_str("auto").unwrap(), BackendKind::Auto);
        assert_eq!(
            BackendKind::from_str("Console").unwrap(),
            BackendKind::Console
        );
        assert_eq!(
            BackendKind::from_str("SUBSTITUTE").unwrap(),
            BackendKind::Substitute
        );
        assert!(BackendKind::from_str("mock").is_err());
    }

    #[test]
    fn test_auto_falls_back_when_binary_missing() {
        let config = BridgeConfig {
            binary: "simbridge-no-such-binary".to_string(),
            ..BridgeConfig::default()
        };

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "substitute");
    }

    #[test]
    fn test_console_kind_fails_when_binary_missing() {
        let config = BridgeConfig {
            backend: BackendKind::Console,
            binary: "simbridge-no-such-binary".to_string(),
            ..BridgeConfig::default()
        };

        let err = create_backend(&config).unwrap_err();
        assert!(matches!(err, Error::BackendNotFound));
    }

    #[test]
    fn test_substitute_kind_is_forced() {
        let config = BridgeConfig {
            backend: BackendKind::Substitute,
            ..BridgeConfig::default()
        };

        let backend = create_backend(&config).unwrap();
        assert_eq!(backend.name(), "substitute");
    }
}
