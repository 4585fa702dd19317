//! Settings parser for .simbridge/config.toml

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::factory::BackendKind;
use simbridge_core::prelude::*;

const CONFIG_FILENAME: &str = "config.toml";
const SIMBRIDGE_DIR: &str = ".simbridge";

/// Construction-time settings for a backend session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Which backend implementation to construct.
    pub backend: BackendKind,
    /// Simulator binary name or path.
    pub binary: String,
    /// Arguments that put the binary into plain console mode.
    pub args: Vec<String>,
    /// System bus parameters applied as `set` directives at construction.
    pub sys_bus_params: BTreeMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            binary: "renode".to_string(),
            args: vec![
                "--console".to_string(),
                "--plain".to_string(),
                "--disable-xwt".to_string(),
            ],
            sys_bus_params: BTreeMap::new(),
        }
    }
}

impl BridgeConfig {
    /// Load settings from `<dir>/.simbridge/config.toml`
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed.
    pub fn load(dir: &Path) -> Self {
        let config_path = dir.join(SIMBRIDGE_DIR).join(CONFIG_FILENAME);

        if !config_path.exists() {
            debug!("No config file at {:?}, using defaults", config_path);
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!("Loaded settings from {:?}", config_path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {:?}: {}", config_path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }
}

/// Parse comma-separated `key=value` pairs into system bus parameters.
///
/// Malformed entries are skipped with a warning rather than failing the whole
/// invocation.
pub fn parse_sys_bus_params(raw: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for entry in raw.split(',') {
        if entry.trim().is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) => {
                params.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => warn!("Invalid system bus parameter format: {}. Skipping.", entry),
        }
    }
    params
}
