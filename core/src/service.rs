use std::collections::HashMap;
use std::sync::Arc;

use crate::calculator::PairCalculator;
use crate::config::Config;
use crate::error::CoreResult;
use crate::repo::ArbitrageRepo;
use crate::top_index::TopIndex;
use crate::types::Tick;

/// Owns one `PairCalculator` per configured pair and drives both
/// persistence and ranking from a single tick ingestion path, keeping
/// one call site for both writes rather than splitting them across
/// separate components.
pub struct CalculateService {
    pairs: HashMap<String, PairCalculator>,
    repo: Arc<dyn ArbitrageRepo>,
    top: Arc<TopIndex>,
}

impl CalculateService {
    pub fn new(config: &Config, repo: Arc<dyn ArbitrageRepo>, top: Arc<TopIndex>) -> Self {
        let pairs = config
            .exchanges
            .pairs
            .iter()
            .map(|pair| (pair.clone(), PairCalculator::new(pair.clone())))
            .collect();

        Self { pairs, repo, top }
    }

    /// Feeds one tick through its pair's calculator. Ticks for pairs
    /// absent from the configured set are dropped rather than silently
    /// creating new calculators, since the set of tracked pairs is
    /// fixed at startup.
    pub async fn save(&mut self, tick: &Tick) -> CoreResult<()> {
        let Some(calculator) = self.pairs.get_mut(&tick.pair) else {
            return Ok(());
        };

        if let Some(arbitrage) = calculator.put(tick) {
            if arbitrage.is_complete() {
                let arbitrage = arbitrage.clone();
                self.top.put(arbitrage.clone());
                self.repo.save(arbitrage).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ExchangeConfig, ExchangesConfig, EngineConfig};
    use crate::repo::InMemoryArbitrageRepo;
    use rust_decimal_macros::dec;
    use std::collections::HashMap as StdHashMap;

    fn config_for(pairs: &[&str]) -> Config {
        Config {
            engine: EngineConfig {
                scan_interval_ms: 100,
                api_port: 8080,
                top_size: 20,
            },
            exchanges: ExchangesConfig {
                pairs: pairs.iter().map(|p| p.to_string()).collect(),
                configs: StdHashMap::<String, ExchangeConfig>::new(),
            },
        }
    }

    #[tokio::test]
    async fn completes_arbitrage_persists_and_ranks() {
        let config = config_for(&["X"]);
        let repo: Arc<dyn ArbitrageRepo> = Arc::new(InMemoryArbitrageRepo::new());
        let top = Arc::new(TopIndex::new());
        let mut service = CalculateService::new(&config, repo.clone(), top.clone());

        service.save(&Tick::new("A", "X", dec!(100))).await.unwrap();
        service.save(&Tick::new("B", "X", dec!(110))).await.unwrap();

        let stored = repo.find_by_pair("X").await.unwrap().unwrap();
        assert_eq!(stored.buy_price, dec!(100));
        assert_eq!(stored.sell_price, dec!(110));
        assert_eq!(top.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn tick_for_unconfigured_pair_is_dropped() {
        let config = config_for(&["X"]);
        let repo: Arc<dyn ArbitrageRepo> = Arc::new(InMemoryArbitrageRepo::new());
        let top = Arc::new(TopIndex::new());
        let mut service = CalculateService::new(&config, repo.clone(), top.clone());

        service.save(&Tick::new("A", "Y", dec!(100))).await.unwrap();

        assert!(repo.find_by_pair("Y").await.unwrap().is_none());
        assert!(top.is_empty());
    }

    #[tokio::test]
    async fn incomplete_arbitrage_is_not_persisted_or_ranked() {
        let config = config_for(&["X"]);
        let repo: Arc<dyn ArbitrageRepo> = Arc::new(InMemoryArbitrageRepo::new());
        let top = Arc::new(TopIndex::new());
        let mut service = CalculateService::new(&config, repo.clone(), top.clone());

        service.save(&Tick::new("A", "X", dec!(100))).await.unwrap();

        assert!(repo.find_by_pair("X").await.unwrap().is_none());
        assert!(top.is_empty());
    }
}
