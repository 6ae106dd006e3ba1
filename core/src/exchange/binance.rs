use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

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

const EXCHANGE_INFO_URI: &str = "/exchangeInfo";
const TICKER_PRICE_URI: &str = "/ticker/price";
const CHUNKS_COUNT: usize = 3;

/// Binance-like venue: REST `/exchangeInfo` + `/ticker/price`, WS
/// `bookTicker` stream split round-robin into `CHUNKS_COUNT` subscribe
/// messages sent 500ms apart to respect subscribe-rate limits.
pub struct BinanceAdapter {
    name: String,
    config: ExchangeConfig,
    client: reqwest::Client,
    fanout: TickFanout,
    calculator: Arc<Mutex<CalculateService>>,
    last_price: DashMap<String, Decimal>,
    shutdown: watch::Receiver<bool>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
struct Symbol {
    status: String,
    #[serde(rename = "baseAsset")]
    base_asset: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
    #[serde(rename = "isSpotTradingAllowed")]
    is_spot_trading_allowed: bool,
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct WsTicker {
    s: Option<String>,
    b: Option<Decimal>,
    result: Option<WsTickerError>,
}

#[derive(Debug, Deserialize)]
struct WsTickerError {
    msg: String,
}

impl BinanceAdapter {
    pub fn new(
        config: ExchangeConfig,
        calculator: Arc<Mutex<CalculateService>>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            name: "binance".to_string(),
            client: reqwest::Client::new(),
            fanout: TickFanout::new("binance"),
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
        let url = url::Url::parse(&self.config.ws_url)
            .map_err(|e| CoreError::Transport {
                exchange: self.name.clone(),
                source: Box::new(e),
            })?;

        let (ws, _) = connect_async(url).await.map_err(|e| CoreError::Transport {
            exchange: self.name.clone(),
            source: Box::new(e),
        })?;
        let (mut write, mut read) = ws.split();

        // symbol -> configured pair, built once per connection rather
        // than re-resolved per frame.
        let symbols: HashMap<String, String> = self
            .config
            .pairs
            .iter()
            .map(|pair| (pair.to_lowercase().replace('_', ""), pair.clone()))
            .collect();

        // Round-robin the configured pairs into CHUNKS_COUNT groups
        // (not groups of CHUNKS_COUNT symbols each).
        let mut groups: Vec<Vec<String>> = vec![Vec::new(); CHUNKS_COUNT];
        for (i, symbol) in symbols.keys().enumerate() {
            groups[i % CHUNKS_COUNT].push(format!("{symbol}@bookTicker"));
        }

        for (i, streams) in groups.into_iter().filter(|g| !g.is_empty()).enumerate() {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let init = serde_json::json!({
                "method": "SUBSCRIBE",
                "params": streams,
                "id": i,
            });
            write
                .send(Message::Text(init.to_string().into()))
                .await
                .map_err(|e| CoreError::Transport {
                    exchange: self.name.clone(),
                    source: Box::new(e),
                })?;
        }

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

                    if let Some(err) = ticker.result {
                        return Err(CoreError::Protocol {
                            exchange: self.name.clone(),
                            message: err.msg,
                        });
                    }

                    let (Some(symbol), Some(bid)) = (ticker.s, ticker.b) else { continue; };
                    let Some(pair) = symbols.get(&symbol.to_lowercase()).cloned() else { continue; };

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
impl ExchangeAdapter for BinanceAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pairs(&self) -> CoreResult<Vec<String>> {
        let url = format!("{}{}", self.config.url, EXCHANGE_INFO_URI);
        let info: ExchangeInfo = self
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

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| {
                s.status == "TRADING"
                    && s.is_spot_trading_allowed
                    && s.permissions.iter().any(|p| p == "SPOT")
            })
            .map(|s| crate::types::canonical_pair(&s.base_asset, &s.quote_asset))
            .collect())
    }

    async fn price(&self, pair: &str) -> CoreResult<Decimal> {
        let symbol = pair.replace('_', "");
        let url = format!("{}{}", self.config.url, TICKER_PRICE_URI);
        let resp: TickerPrice = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
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

        Ok(resp.price)
    }

    async fn subscribe(&self, pair: &str) -> CoreResult<mpsc::Receiver<Tick>> {
        Ok(self.fanout.subscribe(pair).await)
    }
}
