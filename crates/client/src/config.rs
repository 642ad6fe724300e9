//! Client configuration.
//!
//! Every field has a default so a config file only needs `command`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// How to launch and talk to one stdio tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path to the server executable.
    #[serde(default)]
    pub command: PathBuf,

    /// Arguments passed to the server. Defaults to the stdio transport flag.
    #[serde(default = "d_args")]
    pub args: Vec<String>,

    /// Extra environment variables set on the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Upper bound on waiting for any single response.
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,

    /// Pause between spawning the server and sending `initialize`.
    #[serde(default = "d_200")]
    pub startup_delay_ms: u64,

    #[serde(default = "d_protocol_version")]
    pub protocol_version: String,

    #[serde(default = "d_client_name")]
    pub client_name: String,

    #[serde(default = "d_client_version")]
    pub client_version: String,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Grace period for `stop()` before the server is killed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "d_5000")]
    pub grace_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_ms: 5_000 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

impl ClientConfig {
    /// Config for `command` with every other field at its default.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: d_args(),
            env: HashMap::new(),
            request_timeout_ms: d_30000(),
            startup_delay_ms: d_200(),
            protocol_version: d_protocol_version(),
            client_name: d_client_name(),
            client_version: d_client_version(),
            shutdown: ShutdownConfig::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown.grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("parsing {}: {e}", path.display())))
    }
}

fn d_args() -> Vec<String> {
    vec!["-t".into(), "stdio".into()]
}
fn d_30000() -> u64 {
    30_000
}
fn d_200() -> u64 {
    200
}
fn d_5000() -> u64 {
    5_000
}
fn d_protocol_version() -> String {
    "2024-11-05".into()
}
fn d_client_name() -> String {
    "toolpipe".into()
}
fn d_client_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let cfg = ClientConfig::from_toml_str(r#"command = "/opt/server""#).unwrap();
        assert_eq!(cfg.command, PathBuf::from("/opt/server"));
        assert_eq!(cfg.args, vec!["-t", "stdio"]);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.startup_delay(), Duration::from_millis(200));
        assert_eq!(cfg.shutdown.grace(), Duration::from_secs(5));
        assert_eq!(cfg.protocol_version, "2024-11-05");
    }

    #[test]
    fn full_toml_overrides() {
        let raw = r#"
command = "server"
args = ["--stdio"]
request_timeout_ms = 1500
startup_delay_ms = 0
client_name = "e2e"

[env]
DISPLAY = ":1"

[shutdown]
grace_ms = 250
"#;
        let cfg = ClientConfig::from_toml_str(raw).unwrap();
        assert_eq!(cfg.args, vec!["--stdio"]);
        assert_eq!(cfg.request_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.startup_delay(), Duration::ZERO);
        assert_eq!(cfg.client_name, "e2e");
        assert_eq!(cfg.env.get("DISPLAY").map(String::as_str), Some(":1"));
        assert_eq!(cfg.shutdown.grace(), Duration::from_millis(250));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = ClientConfig::from_toml_str("request_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ClientConfig::from_toml_file("/nonexistent/toolpipe.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/toolpipe.toml"));
    }

    #[test]
    fn bad_file_error_is_wrapped_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolpipe.toml");
        std::fs::write(&path, "request_timeout_ms = \"soon\"\n").unwrap();

        let message = ClientConfig::from_toml_file(&path).unwrap_err().to_string();
        assert!(message.starts_with("config: parsing "), "{message}");
        assert_eq!(message.matches("config:").count(), 1, "{message}");
    }

    #[test]
    fn builder_setters() {
        let cfg = ClientConfig::new("srv")
            .with_args(["a", "b"])
            .with_env("K", "V")
            .with_request_timeout(Duration::from_millis(10))
            .with_startup_delay(Duration::ZERO)
            .with_shutdown_grace(Duration::from_millis(20));
        assert_eq!(cfg.args, vec!["a", "b"]);
        assert_eq!(cfg.request_timeout_ms, 10);
        assert_eq!(cfg.startup_delay_ms, 0);
        assert_eq!(cfg.shutdown.grace_ms, 20);
    }
}
