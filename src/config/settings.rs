use std::time::Duration;

use serde::Deserialize;

use crate::broker::pool::ExecutionPool;

/// Top-level configuration settings for the application.
///
/// Includes settings for both the server and the message broker.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
}

impl Settings {
    /// `host:port` the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to and the log level.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// Configuration settings for the broker.
///
/// `pool_size` is the number of threads running subscriber workers and
/// `disconnect_check_interval_ms` is how often an idle worker polls its call
/// for cancellation.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub pool_size: usize,
    pub disconnect_check_interval_ms: u64,
}

impl BrokerSettings {
    pub fn disconnect_check_interval(&self) -> Duration {
        Duration::from_millis(self.disconnect_check_interval_ms.max(1))
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            pool_size: ExecutionPool::DEFAULT_SIZE,
            disconnect_check_interval_ms: 5000,
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub pool_size: Option<usize>,
    pub disconnect_check_interval_ms: Option<u64>,
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let server = self.server;
        let broker = self.broker;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                log_level: server
                    .as_ref()
                    .and_then(|s| s.log_level.clone())
                    .unwrap_or(default.server.log_level),
            },
            broker: BrokerSettings {
                pool_size: broker
                    .as_ref()
                    .and_then(|b| b.pool_size)
                    .unwrap_or(default.broker.pool_size),
                disconnect_check_interval_ms: broker
                    .as_ref()
                    .and_then(|b| b.disconnect_check_interval_ms)
                    .unwrap_or(default.broker.disconnect_check_interval_ms),
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 50051,
                log_level: "info".to_string(),
            },
            broker: BrokerSettings::default(),
        }
    }
}
