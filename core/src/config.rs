use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub exchanges: ExchangesConfig,
}

/// Engine-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scan_interval_ms: u64,
    pub api_port: u16,
    pub top_size: usize,
}

/// Exchange section: the global set of monitored pairs plus one config
/// block per enabled venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangesConfig {
    pub pairs: Vec<String>,
    pub configs: HashMap<String, ExchangeConfig>,
}

/// Per-exchange connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub enabled: bool,
    pub url: String,
    pub ws_url: String,
    pub pairs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut configs = HashMap::new();
        configs.insert(
            "binance".to_string(),
            ExchangeConfig {
                enabled: true,
                url: "https://api.binance.com".to_string(),
                ws_url: "wss://stream.binance.com:9443/ws".to_string(),
                pairs: vec!["BTC_USDT".to_string()],
            },
        );
        configs.insert(
            "exmo".to_string(),
            ExchangeConfig {
                enabled: true,
                url: "https://api.exmo.com/v1.1".to_string(),
                ws_url: "wss://ws-api.exmo.com:1443/v1/public".to_string(),
                pairs: vec!["BTC_USDT".to_string()],
            },
        );
        configs.insert(
            "gate".to_string(),
            ExchangeConfig {
                enabled: true,
                url: "https://api.gateio.ws/api/v4".to_string(),
                ws_url: "wss://api.gateio.ws/ws/v4/".to_string(),
                pairs: vec!["BTC_USDT".to_string()],
            },
        );

        Config {
            engine: EngineConfig {
                scan_interval_ms: 100,
                api_port: 8080,
                top_size: 20,
            },
            exchanges: ExchangesConfig {
                pairs: vec!["BTC_USDT".to_string()],
                configs,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("failed to parse config file: {}. using defaults.", e);
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config file found at {}. using defaults.", path);
                Self::default()
            }
        }
    }

    pub fn get_exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.configs.get(name)
    }
}
