use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::error::{non_finite_price_error, CoreError, CoreResult};
use crate::registry::ExchangeRegistry;
use crate::repo::ArbitrageRepo;
use crate::types::{is_canonical_pair, Arbitrage, LivePrice, Tick};

/// Thin read surface the outer transport exposes to clients. Every
/// operation delegates to the registry or repo; this component owns no
/// state of its own.
pub struct QueryFacade {
    registry: Arc<ExchangeRegistry>,
    repo: Arc<dyn ArbitrageRepo>,
}

impl QueryFacade {
    pub fn new(registry: Arc<ExchangeRegistry>, repo: Arc<dyn ArbitrageRepo>) -> Self {
        Self { registry, repo }
    }

    pub fn exchanges(&self) -> Vec<String> {
        self.registry.list()
    }

    pub async fn pairs(&self, exchange: &str) -> CoreResult<Vec<String>> {
        self.registry.get(exchange)?.pairs().await
    }

    /// A malformed canonical pair or a non-positive venue quote is
    /// surfaced to the caller verbatim rather than forwarded to storage
    /// or ranking.
    pub async fn price(&self, exchange: &str, pair: &str) -> CoreResult<Decimal> {
        if !is_canonical_pair(pair) {
            return Err(CoreError::InvalidInput(format!(
                "malformed pair: {pair}"
            )));
        }
        let price = self.registry.get(exchange)?.price(pair).await?;
        if price <= Decimal::ZERO {
            return Err(non_finite_price_error(price));
        }
        Ok(price)
    }

    pub async fn top(&self, limit: usize) -> CoreResult<Vec<Arbitrage>> {
        self.repo.find_top(limit).await
    }

    /// Subscribes an intermediate `Tick` sink on `exchange`/`pair` and
    /// forwards `tick.price` as `LivePrice` frames to `sink` until the
    /// subscription's receiver is dropped or the adapter closes it.
    pub async fn live_price(
        &self,
        exchange: &str,
        pair: &str,
        sink: mpsc::Sender<LivePrice>,
    ) -> CoreResult<()> {
        if !is_canonical_pair(pair) {
            return Err(CoreError::InvalidInput(format!(
                "malformed pair: {pair}"
            )));
        }
        let adapter = self.registry.get(exchange)?;
        let mut ticks: mpsc::Receiver<Tick> = adapter.subscribe(pair).await?;
        let exchange = exchange.to_string();

        tokio::spawn(async move {
            while let Some(tick) = ticks.recv().await {
                let frame = LivePrice {
                    pair: tick.pair,
                    exchange: exchange.clone(),
                    price: tick.price,
                    time: chrono::Utc::now(),
                };
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EngineConfig, ExchangesConfig};
    use crate::repo::InMemoryArbitrageRepo;
    use crate::service::CalculateService;
    use std::collections::HashMap;
    use tokio::sync::{watch, Mutex};

    fn empty_facade() -> QueryFacade {
        let config = Config {
            engine: EngineConfig {
                scan_interval_ms: 100,
                api_port: 8080,
                top_size: 20,
            },
            exchanges: ExchangesConfig {
                pairs: vec![],
                configs: HashMap::new(),
            },
        };
        let repo: Arc<dyn ArbitrageRepo> = Arc::new(InMemoryArbitrageRepo::new());
        let top = Arc::new(crate::top_index::TopIndex::new());
        let calculator = Arc::new(Mutex::new(CalculateService::new(&config, repo.clone(), top)));
        let (_tx, rx) = watch::channel(false);
        let registry = Arc::new(crate::registry::ExchangeRegistry::new(&config, calculator, rx));
        QueryFacade::new(registry, repo)
    }

    #[tokio::test]
    async fn price_rejects_malformed_pair_before_touching_the_registry() {
        let facade = empty_facade();
        let result = facade.price("binance", "btcusdt").await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn live_price_rejects_malformed_pair_before_touching_the_registry() {
        let facade = empty_facade();
        let (tx, _rx) = mpsc::channel(1);
        let result = facade.live_price("binance", "BTCUSDT", tx).await;
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn price_surfaces_exchange_not_found_for_well_formed_pair() {
        let facade = empty_facade();
        let result = facade.price("binance", "BTC_USDT").await;
        assert!(matches!(result, Err(CoreError::ExchangeNotFound(_))));
    }
}
