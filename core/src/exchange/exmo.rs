use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::ExchangeConfig;
use crate::error::{CoreError, CoreResult};
use crate::exchange::{ExchangeAdapter, TickFanout};
use crate::service::CalculateService;
use crate::types::Tick;

const PAIR_SETTINGS_URI: &str = "/pair_settings";
const REQUIRED_AMOUNT_URI: &str = "/required_amount";

/// Exmo-like venue: REST `/pair_settings` + `/required_amount`, one WS
/// `subscribe` message covering every configured pair.
pub struct ExmoAdapter {
    name: String,
    config: ExchangeConfig,
    client: reqwest::Client,
    fanout: TickFanout,
    calculator: Arc<Mutex<CalculateService>>,
    last_price: DashMap<String, Decimal>,
    shutdown: watch::Receiver<bool>,
}

type PairSettings = HashMap<String, serde_json::Value>;

#[derive(Debug, Deserialize)]
struct RequiredAmount {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct WsTicker {
    event: String,
    topic: String,
    message: Option<String>,
    data: Option<WsTickerData>,
}

#[derive(Debug, Deserialize)]
struct WsTickerData {
    buy_price: Decimal,
}

impl ExmoAdapter {
    pub fn new(
        config: ExchangeConfig,
        calculator: Arc<Mutex<CalculateService>>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let adapter = Arc::new(Self {
            name: "exmo".to_string(),
            client: reqwest::Client::new(),
            fanout: TickFanout::new("exmo"),
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

        let topics: Vec<String> = self
            .config
            .pairs
            .iter()
            .map(|pair| format!("spot/ticker:{pair}"))
            .collect();

        let init = serde_json::json!({
            "id": 1,
            "method": "subscribe",
            "topics": topics,
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

                    if ticker.event == "error" {
                        return Err(CoreError::Protocol {
                            exchange: self.name.clone(),
                            message: ticker.message.unwrap_or_default(),
                        });
                    }
                    if ticker.event != "update" {
                        continue;
                    }

                    let Some(pair) = ticker.topic.split(':').nth(1) else { continue; };
                    let pair = pair.to_string();
                    let Some(data) = ticker.data else { continue; };
                    let bid = data.buy_price;

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
impl ExchangeAdapter for ExmoAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pairs(&self) -> CoreResult<Vec<String>> {
        let url = format!("{}{}", self.config.url, PAIR_SETTINGS_URI);
        let settings: PairSettings = self
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

        Ok(settings.into_keys().collect())
    }

    async fn price(&self, pair: &str) -> CoreResult<Decimal> {
        let url = format!("{}{}", self.config.url, REQUIRED_AMOUNT_URI);
        let resp: RequiredAmount = self
            .client
            .get(&url)
            .query(&[("pair", pair), ("quantity", "1")])
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

        Ok(resp.amount)
    }

    async fn subscribe(&self, pair: &str) -> CoreResult<mpsc::Receiver<Tick>> {
        Ok(self.fanout.subscribe(pair).await)
    }
}
