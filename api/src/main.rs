mod routes;
mod state;
mod ws;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tokio::sync::{watch, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;

use arb_core::{CalculateService, Config, ExchangeRegistry, InMemoryArbitrageRepo, QueryFacade, TopIndex};

use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("arbitrage engine starting");

    let config = Config::load("config.toml");
    let api_port = config.engine.api_port;

    info!(pairs = ?config.exchanges.pairs, "configuration loaded");

    let repo: Arc<dyn arb_core::ArbitrageRepo> = Arc::new(InMemoryArbitrageRepo::new());
    let top = Arc::new(TopIndex::new());
    let calculator = Arc::new(Mutex::new(CalculateService::new(
        &config,
        repo.clone(),
        top.clone(),
    )));

    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let registry = Arc::new(ExchangeRegistry::new(&config, calculator, shutdown_rx));
    info!(exchanges = ?registry.list(), "exchange adapters started");

    let facade = Arc::new(QueryFacade::new(registry, repo));
    let app_state = Arc::new(AppState::new(facade));

    info!("api server listening on http://0.0.0.0:{}", api_port);

    let state_data = app_state.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state_data.clone()))
            .configure(routes::configure)
            .route(
                "/ws/{exchange}/price/{pair}",
                web::get().to(ws::live_price_handler),
            )
    })
    .bind(("0.0.0.0", api_port))?
    .run()
    .await
}
