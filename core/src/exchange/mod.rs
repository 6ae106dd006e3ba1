use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};

use crate::error::{CoreError, CoreResult};
use crate::types::Tick;

pub mod binance;
pub mod exmo;
pub mod gate;

/// Depth of each subscriber's channel. A subscriber that falls this far
/// behind is classified as back-pressure rather than blocking the
/// venue's read loop, isolating adapter health from client health.
pub const SUBSCRIBER_CHANNEL_DEPTH: usize = 64;

/// Contract every venue connector implements: pair discovery, a
/// one-shot REST price, and a live tick subscription.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Tradable pairs as reported by the venue (not the configured
    /// subset being streamed).
    async fn pairs(&self) -> CoreResult<Vec<String>>;

    /// One-shot REST price lookup for a single pair.
    async fn price(&self, pair: &str) -> CoreResult<Decimal>;

    /// Registers a new subscriber for live ticks on `pair`. The
    /// returned receiver is dropped by the caller to unsubscribe.
    async fn subscribe(&self, pair: &str) -> CoreResult<mpsc::Receiver<Tick>>;
}

/// Per-pair subscriber table shared by all three adapters: `pair ->
/// (subscriber_id -> sender)`. Delivery is non-blocking (`try_send`);
/// a full or closed sender is dropped from the table and reported as
/// `CoreError::BackPressure` to the caller, who decides whether that's
/// reconnect-eligible.
pub(crate) struct TickFanout {
    exchange: String,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, HashMap<u64, mpsc::Sender<Tick>>>>,
}

impl TickFanout {
    pub(crate) fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn subscribe(&self, pair: &str) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .await
            .entry(pair.to_string())
            .or_default()
            .insert(id, tx);
        rx
    }

    /// Delivers `tick` to every subscriber of its pair. Subscribers
    /// whose channel is full or closed are pruned; if any were pruned,
    /// returns `BackPressure` so the caller can decide to reconnect.
    pub(crate) async fn dispatch(&self, tick: &Tick) -> CoreResult<()> {
        let mut subscribers = self.subscribers.lock().await;
        let Some(table) = subscribers.get_mut(&tick.pair) else {
            return Ok(());
        };

        let mut dropped = false;
        table.retain(|_, sender| match sender.try_send(tick.clone()) {
            Ok(()) => true,
            Err(_) => {
                dropped = true;
                false
            }
        });

        if dropped {
            return Err(CoreError::BackPressure {
                exchange: self.exchange.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(pair: &str) -> Tick {
        Tick::new("A", pair, dec!(100))
    }

    #[tokio::test]
    async fn dispatch_delivers_to_every_subscriber_of_the_pair() {
        let fanout = TickFanout::new("A");
        let mut rx1 = fanout.subscribe("X").await;
        let mut rx2 = fanout.subscribe("X").await;

        fanout.dispatch(&tick("X")).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().pair, "X");
        assert_eq!(rx2.recv().await.unwrap().pair, "X");
    }

    #[tokio::test]
    async fn dispatch_to_unsubscribed_pair_is_a_no_op() {
        let fanout = TickFanout::new("A");
        fanout.subscribe("X").await;
        assert!(fanout.dispatch(&tick("Y")).await.is_ok());
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_and_reported_as_back_pressure() {
        // P6: a subscription's registration is released once its
        // receiver is dropped, within the next dispatch.
        let fanout = TickFanout::new("A");
        let rx = fanout.subscribe("X").await;
        drop(rx);

        let result = fanout.dispatch(&tick("X")).await;
        assert!(matches!(result, Err(CoreError::BackPressure { .. })));

        // The dead subscriber was pruned: a second dispatch sees no
        // one left and is clean.
        assert!(fanout.dispatch(&tick("X")).await.is_ok());
    }

    #[tokio::test]
    async fn full_channel_is_classified_as_back_pressure_not_delivered() {
        let fanout = TickFanout::new("A");
        let mut rx = fanout.subscribe("X").await;

        for _ in 0..SUBSCRIBER_CHANNEL_DEPTH {
            fanout.dispatch(&tick("X")).await.unwrap();
        }

        // The channel is now full; the next send fails and the
        // subscriber is dropped from the table.
        let result = fanout.dispatch(&tick("X")).await;
        assert!(matches!(result, Err(CoreError::BackPressure { .. })));

        // Still able to drain what was buffered before the drop.
        for _ in 0..SUBSCRIBER_CHANNEL_DEPTH {
            assert!(rx.recv().await.is_some());
        }
    }
}
