use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized price event for one (venue, pair).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub exchange: String,
    pub pair: String,
    pub price: Decimal,
}

impl Tick {
    pub fn new(exchange: impl Into<String>, pair: impl Into<String>, price: Decimal) -> Self {
        Self {
            exchange: exchange.into(),
            pair: pair.into(),
            price,
        }
    }
}

/// Best-pair arbitrage snapshot for a single pair.
///
/// Pre-data sentinels: `sell_price = -1`, `buy_price = Decimal::MAX`,
/// no venues set. Complete iff both exchanges are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arbitrage {
    pub pair: String,
    pub buy_exchange: Option<String>,
    pub sell_exchange: Option<String>,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub profit_pct: Decimal,
}

impl Arbitrage {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            buy_exchange: None,
            sell_exchange: None,
            buy_price: Decimal::MAX,
            sell_price: Decimal::NEGATIVE_ONE,
            profit_pct: Decimal::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.buy_exchange.is_some() && self.sell_exchange.is_some()
    }
}

impl fmt::Display for Arbitrage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buy={:?}@{} sell={:?}@{} profit={}%",
            self.pair,
            self.buy_exchange,
            self.buy_price,
            self.sell_exchange,
            self.sell_price,
            self.profit_pct
        )
    }
}

/// Live price frame pushed to a subscriber, per the external `Live` JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivePrice {
    pub pair: String,
    pub exchange: String,
    pub price: Decimal,
    pub time: DateTime<Utc>,
}

/// Top-row JSON shape returned by the query facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopRow {
    pub pair: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub profit: Decimal,
}

impl TryFrom<&Arbitrage> for TopRow {
    type Error = ();

    fn try_from(a: &Arbitrage) -> Result<Self, Self::Error> {
        match (&a.buy_exchange, &a.sell_exchange) {
            (Some(buy), Some(sell)) => Ok(TopRow {
                pair: a.pair.clone(),
                buy_exchange: buy.clone(),
                sell_exchange: sell.clone(),
                buy_price: a.buy_price,
                sell_price: a.sell_price,
                profit: a.profit_pct,
            }),
            _ => Err(()),
        }
    }
}

/// Canonicalizes a `base/quote`-ish pair string to `BASE_QUOTE`.
pub fn canonical_pair(base: &str, quote: &str) -> String {
    format!("{}_{}", base.to_uppercase(), quote.to_uppercase())
}

/// Checks that `pair` is in canonical `BASE_QUOTE` form: two uppercase
/// alphanumeric segments joined by a single underscore.
pub fn is_canonical_pair(pair: &str) -> bool {
    let Some((base, quote)) = pair.split_once('_') else {
        return false;
    };
    !base.is_empty()
        && !quote.is_empty()
        && !quote.contains('_')
        && base.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && quote.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_joins_uppercased_segments() {
        assert_eq!(canonical_pair("btc", "usdt"), "BTC_USDT");
    }

    #[test]
    fn is_canonical_pair_accepts_well_formed_pairs() {
        assert!(is_canonical_pair("BTC_USDT"));
        assert!(is_canonical_pair("ETH_BTC"));
    }

    #[test]
    fn is_canonical_pair_rejects_malformed_pairs() {
        assert!(!is_canonical_pair("btc_usdt"));
        assert!(!is_canonical_pair("BTCUSDT"));
        assert!(!is_canonical_pair("BTC_USD_T"));
        assert!(!is_canonical_pair("_USDT"));
        assert!(!is_canonical_pair("BTC_"));
    }
}
