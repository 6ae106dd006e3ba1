use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::ExchangeConfig;
use crate::error::{CoreError, CoreResult};
use crate::exchange::{ExchangeAdapter, TickFanout};
use crate::service::CalculateService;
use crate::types::Tick;

const PAIRS_URI: &str = "/spot/currency_pairs";
const TICKER_URI: &str = "/spot/tickers";

/// Gate-like venue: REST `/spot/currency_pairs` + `/spot/tickers`, one
/// WS `spot.tickers` subscribe message per connection.
pub struct GateAdapter {
    name: String,
    config: ExchangeConfig,
    client: reqwest::Client,
    fanout: TickFanout,
    calculator: Arc<Mutex<CalculateService>>,
    last_price: DashMap<String, Decimal>,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Deserialize)]
struct Pair {
    id: String,
    trade_status: String,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    last: Decimal,
    highest_bid: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct WsTicker {
    event: String,
    result: Option<WsTickerResult>,
}

#[derive(Debug, Deserialize)]
struct WsTickerResult {
    currency_pair: String,
    last: Decimal,
    highest_bid: Option<Decimal>,
}

impl GateAdapter {
    pub fn new(
        config: ExchangeConfig,
        calculator: Arc<Mutex<CalculateService>>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            name: "gate".to_string(),
            client: reqwest::Client::new(),
            fanout: TickFanout::new("gate"),
            calculator,
            last_price: DashMap::new(),
            shutdown,
            config,
        });

        let spawned = adapter.clone();
        tokio::spawn(async move { spawned.run_forever().await });

        adapter
    }

    async fn run_forever(self: Arc<Self>) {
        loop {
            match self.run_once().await {
                Ok(()) => {
                    info!(exchange = %self.name, "stream closed cleanly");
                    break;
                }
                Err(e) if e.is_reconnect_eligible() => {
                    warn!(exchange = %self.name, error = %e, "reconnecting after back-pressure");
                    continue;
                }
                Err(e) => {
                    error!(exchange = %self.name, error = %e, "giving up on stream");
                    break;
                }
            }
        }
    }

    async fn run_once(&self) -> CoreResult<()> {
        let url = url::Url::parse(&self.config.ws_url).map_err(|e| CoreError::Transport {
            exchange: self.name.clone(),
            source: Box::new(e),
        })?;

        let (ws, _) = connect_async(url).await.map_err(|e| CoreError::Transport {
            exchange: self.name.clone(),
            source: Box::new(e),
        })?;
        let (mut write, mut read) = ws.split();

        let init = serde_json::json!({
            "time": chrono::Utc::now().timestamp(),
            "channel": "spot.tickers",
            "event": "subscribe",
            "payload": self.config.pairs,
        });
        write
            .send(Message::Text(init.to_string().into()))
            .await
            .map_err(|e| CoreError::Transport {
                exchange: self.name.clone(),
                source: Box::new(e),
            })?;

        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(exchange = %self.name, "shutdown signal received");
                        return Ok(());
                    }
                }
                msg = read.next() => {
                    let Some(msg) = msg else { return Ok(()); };
                    let msg = msg.map_err(|e| CoreError::Transport {
                        exchange: self.name.clone(),
                        source: Box::new(e),
                    })?;
                    let Message::Text(text) = msg else { continue; };

                    let ticker: WsTicker = serde_json::from_str(&text).map_err(|e| CoreError::Protocol {
                        exchange: self.name.clone(),
                        message: format!("bad ticker frame: {e}"),
                    })?;

                    if ticker.event != "update" {
                        continue;
                    }
                    let Some(result) = ticker.result else { continue; };

                    // last-price memo tracks best bid uniformly across
                    // venues; gate's `highest_bid` carries that role
                    // (see DESIGN.md for why `last` isn't used here).
                    let bid = result.highest_bid.unwrap_or(result.last);
                    let pair = result.currency_pair;

                    if self.last_price.get(&pair).map(|p| *p) == Some(bid) {
                        continue;
                    }
                    self.last_price.insert(pair.clone(), bid);

                    let tick = Tick::new(self.name.clone(), pair, bid);
                    debug!(exchange = %self.name, pair = %tick.pair, price = %tick.price, "tick");

                    self.calculator.lock().await.save(&tick).await?;
                    self.fanout.dispatch(&tick).await?;
                }
            }
        }
    }
}

#[async_trait]
impl ExchangeAdapter for GateAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pairs(&self) -> CoreResult<Vec<String>> {
        let url = format!("{}{}", self.config.url, PAIRS_URI);
        let pairs: Vec<Pair> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Transport {
                exchange: self.name.clone(),
                source: Box::new(e),
            })?
            .json()
            .await
            .map_err(|e| CoreError::Protocol {
                exchange: self.name.clone(),
                message: e.to_string(),
            })?;

        Ok(pairs
            .into_iter()
            .filter(|p| p.trade_status == "tradable")
            .map(|p| p.id)
            .collect())
    }

    async fn price(&self, pair: &str) -> CoreResult<Decimal> {
        let url = format!("{}{}", self.config.url, TICKER_URI);
        let tickers: Vec<Ticker> = self
            .client
            .get(&url)
            .query(&[("currency_pair", pair)])
            .send()
            .await
            .map_err(|e| CoreError::Transport {
                exchange: self.name.clone(),
                source: Box::new(e),
            })?
            .json()
            .await
            .map_err(|e| CoreError::Protocol {
                exchange: self.name.clone(),
                message: e.to_string(),
            })?;

        tickers
            .into_iter()
            .next()
            .map(|t| t.highest_bid.unwrap_or(t.last))
            .ok_or_else(|| CoreError::Protocol {
                exchange: self.name.clone(),
                message: format!("no ticker for pair {pair}"),
            })
    }

    async fn subscribe(&self, pair: &str) -> CoreResult<mpsc::Receiver<Tick>> {
        Ok(self.fanout.subscribe(pair).await)
    }
}
