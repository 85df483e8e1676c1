//! Configuration for the bridge connection and output files
//!
//! Loads optional settings from config.yml; environment variables win.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Output file, relative to the current working directory.
pub const CONTACTS_FILE: &str = "contacts.txt";
pub const CREDENTIALS_FILE: &str = "./credentials.json";
pub const CREDENTIALS_LOCK_FILE: &str = "./credentials.lock";

/// Debounce window advertised by the CLI.
pub const DEFAULT_DEBOUNCE_SECS: f64 = 5.0;
/// Debounce window used when `--time` cannot be read as a number.
pub const FALLBACK_DEBOUNCE_SECS: f64 = 10.0;

pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:8787";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const BRIDGE_ADDR_ENV: &str = "WA_BRIDGE_ADDR";

/// Interpret a raw `--time` value.
///
/// Never fails: unparseable or non-finite input yields
/// [`FALLBACK_DEBOUNCE_SECS`], negative input clamps to zero.
pub fn parse_debounce_secs(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() => secs.max(0.0),
        _ => FALLBACK_DEBOUNCE_SECS,
    }
}

/// Debounce window as a `Duration`.
///
/// NaN falls back to [`FALLBACK_DEBOUNCE_SECS`]; windows too large for a
/// `Duration` saturate, so the run waits indefinitely as asked.
pub fn debounce_window(secs: f64) -> Duration {
    if secs.is_nan() {
        return Duration::from_secs_f64(FALLBACK_DEBOUNCE_SECS);
    }
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[derive(Debug, Deserialize)]
struct YamlConfig {
    bridge: Option<BridgeConfig>,
}

#[derive(Debug, Deserialize)]
struct BridgeConfig {
    addr: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bridge_addr: String,
    /// Limit on the TCP handshake with the bridge, not on session open.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    pub fn new() -> Self {
        Self::load_from_file("config.yml").unwrap_or_else(|_| Self::defaults())
    }

    fn defaults() -> Self {
        Self::load_dotenv();
        Self {
            bridge_addr: Self::resolve_env_string(None, BRIDGE_ADDR_ENV)
                .unwrap_or_else(|| DEFAULT_BRIDGE_ADDR.to_string()),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Resolve a value: `${VAR}` placeholders and `env_key` take precedence
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value.filter(|v| !v.starts_with("${"))
    }

    fn load_dotenv() {
        let _ = dotenvy::dotenv();
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_yaml(&content)
    }

    fn from_yaml(content: &str) -> Result<Self, String> {
        let yaml: YamlConfig = serde_yaml::from_str(content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        let bridge = yaml.bridge.unwrap_or(BridgeConfig {
            addr: None,
            connect_timeout_secs: None,
        });

        Ok(Self {
            bridge_addr: Self::resolve_env_string(bridge.addr, BRIDGE_ADDR_ENV)
                .unwrap_or_else(|| DEFAULT_BRIDGE_ADDR.to_string()),
            connect_timeout: Duration::from_secs(
                bridge
                    .connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        })
    }
}
