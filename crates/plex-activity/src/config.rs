//! Configuration for the activity sources

use crate::error::{Error, Result};
use crate::sources::websocket::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root activity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Media server connection
    #[serde(default)]
    pub server: ServerConfig,
    /// Notification socket source
    #[serde(default)]
    pub websocket: WebSocketConfig,
    /// Log tailing source
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Media server connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Authentication token (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Notification socket settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Whether the source is started
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Connection retry policy
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

/// Log tailing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether the source is started
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path of the active server log; discovered when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Give up after this many seconds without a new line
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Poll interval while waiting for new lines
    #[serde(default = "default_stale_sleep_ms")]
    pub stale_sleep_ms: u64,
    /// Poll interval for the first (priming) read
    #[serde(default = "default_priming_stale_sleep_ms")]
    pub priming_stale_sleep_ms: u64,
    /// Pause after every line read
    #[serde(default = "default_line_pause_ms")]
    pub line_pause_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    32400
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_stale_sleep_ms() -> u64 {
    1000
}

fn default_priming_stale_sleep_ms() -> u64 {
    500
}

fn default_line_pause_ms() -> u64 {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: None,
        }
    }
}

impl ServerConfig {
    /// Subscription URI of the server's notification channel
    pub fn notification_uri(&self) -> String {
        let mut uri = format!("ws://{}:{}/:/websockets/notifications", self.host, self.port);

        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            uri.push_str("?X-Plex-Token=");
            uri.push_str(&urlencoding::encode(token));
        }

        uri
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            timeout_secs: default_timeout_secs(),
            stale_sleep_ms: default_stale_sleep_ms(),
            priming_stale_sleep_ms: default_priming_stale_sleep_ms(),
            line_pause_ms: default_line_pause_ms(),
        }
    }
}

impl LoggingConfig {
    /// Staleness timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Poll interval while stale
    pub fn stale_sleep(&self) -> Duration {
        Duration::from_millis(self.stale_sleep_ms)
    }

    /// Poll interval for the priming read
    pub fn priming_stale_sleep(&self) -> Duration {
        Duration::from_millis(self.priming_stale_sleep_ms)
    }

    /// Pause after every line
    pub fn line_pause(&self) -> Duration {
        Duration::from_millis(self.line_pause_ms)
    }
}

impl ActivityConfig {
    /// Load configuration from file
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, anything else as JSON.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;

        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `PLEX_HOST`, `PLEX_PORT`, `PLEXTOKEN` and `PLEX_LOG_PATH`
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Overlay variables from an arbitrary lookup
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("PLEX_HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }

        if let Some(port) = lookup("PLEX_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PLEX_PORT value: {}", port),
            }
        }

        if let Some(token) = lookup("PLEXTOKEN").filter(|t| !t.is_empty()) {
            self.server.token = Some(token);
        }

        if let Some(path) = lookup("PLEX_LOG_PATH").filter(|p| !p.is_empty()) {
            self.logging.path = Some(PathBuf::from(path));
        }
    }

    /// Reject settings the sources cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(Error::Config("server.host must not be empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(Error::Config("server.port must not be 0".to_string()));
        }
        if self.websocket.reconnect.max_attempts == 0 {
            return Err(Error::Config(
                "websocket.reconnect.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.logging.timeout_secs == 0 {
            return Err(Error::Config("logging.timeout_secs must not be 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ActivityConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 32400);
        assert!(config.websocket.enabled);
        assert!(config.logging.enabled);
        assert_eq!(config.logging.timeout(), Duration::from_secs(60));
        assert_eq!(config.logging.line_pause(), Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_notification_uri() {
        let mut server = ServerConfig::default();
        assert_eq!(
            server.notification_uri(),
            "ws://127.0.0.1:32400/:/websockets/notifications"
        );

        server.token = Some(String::new());
        assert_eq!(
            server.notification_uri(),
            "ws://127.0.0.1:32400/:/websockets/notifications"
        );

        server.host = "plex.local".to_string();
        server.port = 32401;
        server.token = Some("abc/123+=".to_string());
        assert_eq!(
            server.notification_uri(),
            "ws://plex.local:32401/:/websockets/notifications?X-Plex-Token=abc%2F123%2B%3D"
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
server:
  host: 10.0.0.5
  token: secret
logging:
  path: /tmp/plex.log
  timeout_secs: 5
websocket:
  reconnect:
    max_attempts: 3
"#;
        let config: ActivityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.host, "10.0.0.5");
        assert_eq!(config.server.port, 32400);
        assert_eq!(config.server.token.as_deref(), Some("secret"));
        assert_eq!(config.logging.path, Some(PathBuf::from("/tmp/plex.log")));
        assert_eq!(config.logging.timeout_secs, 5);
        assert_eq!(config.logging.stale_sleep_ms, 1000);
        assert_eq!(config.websocket.reconnect.max_attempts, 3);
        assert_eq!(config.websocket.reconnect, ReconnectPolicy {
            max_attempts: 3,
            ..ReconnectPolicy::default()
        });
    }

    #[test]
    fn test_apply_vars() {
        let vars: HashMap<&str, &str> = [
            ("PLEX_HOST", "media.lan"),
            ("PLEX_PORT", "not-a-port"),
            ("PLEXTOKEN", "token-1"),
            ("PLEX_LOG_PATH", "/var/log/plex.log"),
        ]
        .into_iter()
        .collect();

        let mut config = ActivityConfig::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host, "media.lan");
        assert_eq!(config.server.port, 32400);
        assert_eq!(config.server.token.as_deref(), Some("token-1"));
        assert_eq!(config.logging.path, Some(PathBuf::from("/var/log/plex.log")));
    }

    #[test]
    fn test_validation() {
        let mut config = ActivityConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = ActivityConfig::default();
        config.websocket.reconnect.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[smol_potat::test]
    async fn test_from_file_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("activity.json");
        async_fs::write(&json_path, r#"{"server": {"port": 32500}, "logging": {"enabled": false}}"#)
            .await
            .unwrap();
        let config = ActivityConfig::from_file(&json_path).await.unwrap();
        assert_eq!(config.server.port, 32500);
        assert!(!config.logging.enabled);

        let yaml_path = dir.path().join("activity.yml");
        async_fs::write(&yaml_path, "websocket:\n  enabled: false\n")
            .await
            .unwrap();
        let config = ActivityConfig::from_file(&yaml_path).await.unwrap();
        assert!(!config.websocket.enabled);

        let bad_path = dir.path().join("bad.json");
        async_fs::write(&bad_path, "{not json").await.unwrap();
        assert!(matches!(
            ActivityConfig::from_file(&bad_path).await,
            Err(Error::Json(_))
        ));
    }
}
