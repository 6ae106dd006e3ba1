use rust_decimal::Decimal;

use crate::types::{Arbitrage, Tick};

/// Per-pair incremental arbitrage state machine.
///
/// Holds a single `Arbitrage` value for one fixed pair and updates it
/// incrementally as ticks arrive, maintaining distinct buy/sell venues,
/// the best-known price per held venue, and the rule that every `put`
/// either changes nothing or reflects the incoming tick on one side.
pub struct PairCalculator {
    pair: String,
    arbitrage: Arbitrage,
}

impl PairCalculator {
    pub fn new(pair: impl Into<String>) -> Self {
        let pair = pair.into();
        Self {
            arbitrage: Arbitrage::new(pair.clone()),
            pair,
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn current(&self) -> &Arbitrage {
        &self.arbitrage
    }

    /// Feeds one tick into the state machine.
    ///
    /// The very first tick seen for a pair (neither side held yet)
    /// seeds the buy side: the sell sentinel (`-1`) would otherwise be
    /// beaten trivially by any positive price, routing every pair's
    /// opening observation to the sell side regardless of which venue
    /// reported it. After that, the sell side is checked first: the
    /// venue currently held as `sell_exchange` is always trusted on its
    /// latest quote regardless of direction, and any other venue can
    /// only dislodge it by quoting strictly higher while not being the
    /// held buy venue. Only if neither sell-side condition holds does
    /// the tick get a chance on the buy side, under the mirrored rule.
    /// Returns `None` if the tick belongs to another pair, or if it
    /// neither originates from a held venue nor beats the held price
    /// without colliding with the other side.
    pub fn put(&mut self, tick: &Tick) -> Option<&Arbitrage> {
        if tick.pair != self.pair {
            return None;
        }

        if self.arbitrage.buy_exchange.is_none() && self.arbitrage.sell_exchange.is_none() {
            self.set_buy(tick);
            return Some(&self.arbitrage);
        }

        let is_sell_holder = self.arbitrage.sell_exchange.as_deref() == Some(tick.exchange.as_str());
        let beats_sell = tick.price > self.arbitrage.sell_price
            && self.arbitrage.buy_exchange.as_deref() != Some(tick.exchange.as_str());

        if is_sell_holder || beats_sell {
            self.set_sell(tick);
            return Some(&self.arbitrage);
        }

        let is_buy_holder = self.arbitrage.buy_exchange.as_deref() == Some(tick.exchange.as_str());
        let beats_buy = tick.price < self.arbitrage.buy_price
            && self.arbitrage.sell_exchange.as_deref() != Some(tick.exchange.as_str());

        if is_buy_holder || beats_buy {
            self.set_buy(tick);
            return Some(&self.arbitrage);
        }

        None
    }

    fn set_sell(&mut self, tick: &Tick) {
        self.arbitrage.sell_price = tick.price;
        self.arbitrage.sell_exchange = Some(tick.exchange.clone());
        self.recompute_profit();
    }

    fn set_buy(&mut self, tick: &Tick) {
        self.arbitrage.buy_price = tick.price;
        self.arbitrage.buy_exchange = Some(tick.exchange.clone());
        self.recompute_profit();
    }

    fn recompute_profit(&mut self) {
        if self.arbitrage.sell_price <= Decimal::ZERO {
            self.arbitrage.profit_pct = Decimal::ZERO;
            return;
        }
        self.arbitrage.profit_pct =
            (self.arbitrage.sell_price - self.arbitrage.buy_price) / self.arbitrage.sell_price
                * Decimal::ONE_HUNDRED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(exchange: &str, price: rust_decimal::Decimal) -> Tick {
        Tick::new(exchange, "X", price)
    }

    #[test]
    fn two_venue_basic() {
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        let arb = c.put(&tick("B", dec!(110))).unwrap().clone();
        assert_eq!(arb.buy_exchange.as_deref(), Some("A"));
        assert_eq!(arb.sell_exchange.as_deref(), Some("B"));
        assert_eq!(arb.buy_price, dec!(100));
        assert_eq!(arb.sell_price, dec!(110));
        assert_eq!(arb.profit_pct.round_dp(4), dec!(9.0909));
    }

    #[test]
    fn same_venue_replacement_trusts_held_sell_venue() {
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        c.put(&tick("B", dec!(110)));
        let arb = c.put(&tick("B", dec!(108))).unwrap().clone();
        assert_eq!(arb.buy_exchange.as_deref(), Some("A"));
        assert_eq!(arb.sell_exchange.as_deref(), Some("B"));
        assert_eq!(arb.buy_price, dec!(100));
        assert_eq!(arb.sell_price, dec!(108));
        assert_eq!(arb.profit_pct.round_dp(4), dec!(7.4074));
    }

    #[test]
    fn better_buy_side_overrides() {
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        c.put(&tick("B", dec!(110)));
        let arb = c.put(&tick("C", dec!(90))).unwrap().clone();
        assert_eq!(arb.buy_exchange.as_deref(), Some("C"));
        assert_eq!(arb.sell_exchange.as_deref(), Some("B"));
        assert_eq!(arb.buy_price, dec!(90));
        assert_eq!(arb.sell_price, dec!(110));
        assert_eq!(arb.profit_pct.round_dp(4), dec!(18.1818));
    }

    #[test]
    fn held_buy_venue_is_trusted_even_past_the_sell_price() {
        // buy=A@100, sell=B@110. A re-quotes at 115: the sell-side guard
        // (exchange != held buy venue) excludes it from the sell branch,
        // but A is still the held buy venue, so its new quote is trusted
        // there — profit can go negative rather than the tick being
        // dropped, since the calculator has no notion of "too high to
        // be a buy quote".
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        c.put(&tick("B", dec!(110)));
        let arb = c.put(&tick("A", dec!(115))).unwrap().clone();
        assert_eq!(arb.buy_exchange.as_deref(), Some("A"));
        assert_eq!(arb.sell_exchange.as_deref(), Some("B"));
        assert_eq!(arb.buy_price, dec!(115));
        assert_eq!(arb.sell_price, dec!(110));
        assert_eq!(arb.profit_pct.round_dp(4), dec!(-4.5455));
    }

    #[test]
    fn tick_from_neither_held_venue_without_beating_either_side_is_dropped() {
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        c.put(&tick("B", dec!(110)));
        let before = c.current().clone();
        // C neither holds a side nor beats buy(100) or sell(110).
        let result = c.put(&tick("C", dec!(105)));
        assert!(result.is_none());
        assert_eq!(*c.current(), before);
    }

    #[test]
    fn unrelated_pair_is_dropped() {
        let mut c = PairCalculator::new("X");
        let other = Tick::new("A", "Y", dec!(100));
        assert!(c.put(&other).is_none());
    }

    #[test]
    fn duplicate_price_is_a_no_op_once_held() {
        let mut c = PairCalculator::new("X");
        c.put(&tick("A", dec!(100)));
        c.put(&tick("B", dec!(110)));
        // A re-quoting its already-held buy price neither beats itself
        // (not strictly less) nor holds the sell side.
        let result = c.put(&tick("A", dec!(100)));
        // A is buy holder, so is_buy_holder is true: it does refresh.
        assert!(result.is_some());
    }

    #[test]
    fn incomplete_arbitrage_has_zero_profit_sentinel() {
        let c = PairCalculator::new("X");
        assert!(!c.current().is_complete());
        assert_eq!(c.current().sell_price, Decimal::NEGATIVE_ONE);
    }
}
