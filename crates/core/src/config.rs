//! Bridge configuration, loaded from YAML with every field defaulted.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub broker: BrokerConfig,
    pub queues: QueueNames,
    pub channels: ChannelFlags,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueNames {
    pub daily: String,
    pub realtime: String,
    pub ex_rights: String,
    pub symbols: String,
}

/// Per-category enable flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelFlags {
    pub daily: bool,
    pub realtime: bool,
    pub ex_rights: bool,
    pub symbols: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            queues: QueueNames::default(),
            channels: ChannelFlags::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5678,
            connect_timeout_ms: 5000,
            send_timeout_ms: 10_000,
        }
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            daily: "daily_data_queue".to_string(),
            realtime: "realtime_data_queue".to_string(),
            ex_rights: "ex_rights_data_queue".to_string(),
            symbols: "market_table_queue".to_string(),
        }
    }
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self {
            daily: true,
            realtime: true,
            ex_rights: true,
            symbols: true,
        }
    }
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::Validation("broker host is empty".to_string()));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Validation("broker port is zero".to_string()));
        }
        for (name, value) in [
            ("daily", &self.queues.daily),
            ("realtime", &self.queues.realtime),
            ("ex_rights", &self.queues.ex_rights),
            ("symbols", &self.queues.symbols),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "queue name for {name} is empty"
                )));
            }
        }
        Ok(())
    }
}
