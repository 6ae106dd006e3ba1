use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::exchange::binance::BinanceAdapter;
use crate::exchange::exmo::ExmoAdapter;
use crate::exchange::gate::GateAdapter;
use crate::exchange::ExchangeAdapter;
use crate::service::CalculateService;

/// Builds and owns one adapter per enabled venue in `Config.exchanges`.
pub struct ExchangeRegistry {
    exchanges: HashMap<String, Arc<dyn ExchangeAdapter>>,
}

impl ExchangeRegistry {
    pub fn new(
        config: &Config,
        calculator: Arc<Mutex<CalculateService>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let mut exchanges: HashMap<String, Arc<dyn ExchangeAdapter>> = HashMap::new();

        for (name, exchange_config) in &config.exchanges.configs {
            if !exchange_config.enabled {
                continue;
            }

            let adapter: Arc<dyn ExchangeAdapter> = match name.as_str() {
                "binance" => {
                    BinanceAdapter::new(exchange_config.clone(), calculator.clone(), shutdown.clone())
                }
                "exmo" => {
                    ExmoAdapter::new(exchange_config.clone(), calculator.clone(), shutdown.clone())
                }
                "gate" => {
                    GateAdapter::new(exchange_config.clone(), calculator.clone(), shutdown.clone())
                }
                other => {
                    tracing::warn!(exchange = other, "unknown exchange in config, skipping");
                    continue;
                }
            };

            exchanges.insert(name.clone(), adapter);
        }

        Self { exchanges }
    }

    pub fn list(&self) -> Vec<String> {
        self.exchanges.keys().cloned().collect()
    }

    pub fn get(&self, exchange: &str) -> CoreResult<Arc<dyn ExchangeAdapter>> {
        self.exchanges
            .get(exchange)
            .cloned()
            .ok_or_else(|| CoreError::ExchangeNotFound(exchange.to_string()))
    }
}
