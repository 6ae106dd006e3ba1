use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CoreResult;
use crate::types::Arbitrage;

/// Sort direction for `find_all_by_filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Query parameters for a filtered scan. Profit is the only sortable
/// field, so this stays single-field rather than growing a generic
/// sort-key enum.
#[derive(Debug, Clone)]
pub struct ArbitrageFilter {
    pub limit: usize,
    pub sort_dir: SortDirection,
}

impl Default for ArbitrageFilter {
    fn default() -> Self {
        Self {
            limit: 20,
            sort_dir: SortDirection::Desc,
        }
    }
}

/// Storage contract for `Arbitrage` rows, keyed by pair.
///
/// `save` is an upsert: callers never need to know whether a pair has
/// been seen before.
#[async_trait]
pub trait ArbitrageRepo: Send + Sync {
    async fn save(&self, arbitrage: Arbitrage) -> CoreResult<()>;
    async fn find_by_pair(&self, pair: &str) -> CoreResult<Option<Arbitrage>>;
    async fn find_all_by_filter(&self, filter: &ArbitrageFilter) -> CoreResult<Vec<Arbitrage>>;
    async fn find_top(&self, limit: usize) -> CoreResult<Vec<Arbitrage>> {
        self.find_all_by_filter(&ArbitrageFilter {
            limit,
            sort_dir: SortDirection::Desc,
        })
        .await
    }
}

/// In-memory `ArbitrageRepo`, backed by `dashmap` for lock-free
/// concurrent upserts from many pair-calculator writers at once.
pub struct InMemoryArbitrageRepo {
    rows: DashMap<String, Arbitrage>,
}

impl InMemoryArbitrageRepo {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl Default for InMemoryArbitrageRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArbitrageRepo for InMemoryArbitrageRepo {
    async fn save(&self, arbitrage: Arbitrage) -> CoreResult<()> {
        self.rows.insert(arbitrage.pair.clone(), arbitrage);
        Ok(())
    }

    async fn find_by_pair(&self, pair: &str) -> CoreResult<Option<Arbitrage>> {
        Ok(self.rows.get(pair).map(|r| r.value().clone()))
    }

    async fn find_all_by_filter(&self, filter: &ArbitrageFilter) -> CoreResult<Vec<Arbitrage>> {
        let mut rows: Vec<Arbitrage> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| match filter.sort_dir {
            SortDirection::Desc => b.profit_pct.cmp(&a.profit_pct),
            SortDirection::Asc => a.profit_pct.cmp(&b.profit_pct),
        });
        rows.truncate(filter.limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn arb(pair: &str, profit: rust_decimal::Decimal) -> Arbitrage {
        Arbitrage {
            pair: pair.to_string(),
            buy_exchange: Some("A".to_string()),
            sell_exchange: Some("B".to_string()),
            buy_price: dec!(1),
            sell_price: dec!(1),
            profit_pct: profit,
        }
    }

    #[tokio::test]
    async fn save_then_find_by_pair_round_trips() {
        let repo = InMemoryArbitrageRepo::new();
        repo.save(arb("X", dec!(5))).await.unwrap();
        let found = repo.find_by_pair("X").await.unwrap();
        assert_eq!(found.unwrap().profit_pct, dec!(5));
    }

    #[tokio::test]
    async fn save_is_an_upsert_by_pair() {
        let repo = InMemoryArbitrageRepo::new();
        repo.save(arb("X", dec!(5))).await.unwrap();
        repo.save(arb("X", dec!(9))).await.unwrap();
        let all = repo
            .find_all_by_filter(&ArbitrageFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].profit_pct, dec!(9));
    }

    #[tokio::test]
    async fn find_top_sorts_descending_and_truncates() {
        let repo = InMemoryArbitrageRepo::new();
        repo.save(arb("A", dec!(3))).await.unwrap();
        repo.save(arb("B", dec!(9))).await.unwrap();
        repo.save(arb("C", dec!(1))).await.unwrap();
        let top = repo.find_top(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].pair, "B");
        assert_eq!(top[1].pair, "A");
    }
}
