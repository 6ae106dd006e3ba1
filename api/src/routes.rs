use std::sync::Arc;

use actix_web::{web, HttpResponse};
use arb_core::CoreError;
use serde::Deserialize;

use crate::state::AppState;

fn error_response(err: CoreError) -> HttpResponse {
    match err {
        CoreError::ExchangeNotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
            "error": err.to_string(),
        })),
        CoreError::InvalidInput(_) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": err.to_string(),
        })),
        _ => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": err.to_string(),
        })),
    }
}

/// GET /api/exchanges — venue names, delegates to `QueryFacade::exchanges`.
pub async fn get_exchanges(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(state.facade.exchanges())
}

/// GET /api/exchanges/{exchange}/pairs — delegates to `QueryFacade::pairs`.
pub async fn get_pairs(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> HttpResponse {
    match state.facade.pairs(&path).await {
        Ok(pairs) => HttpResponse::Ok().json(pairs),
        Err(e) => error_response(e),
    }
}

/// GET /api/exchanges/{exchange}/price/{pair} — delegates to `QueryFacade::price`.
pub async fn get_price(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (exchange, pair) = path.into_inner();
    match state.facade.price(&exchange, &pair).await {
        Ok(price) => HttpResponse::Ok().json(price),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

/// GET /api/top?limit= — delegates to `QueryFacade::top`, JSON shape
/// `{pair, buy_exchange, sell_exchange, buy_price, sell_price, profit}`.
pub async fn get_top(
    state: web::Data<Arc<AppState>>,
    query: web::Query<TopQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(20);
    match state.facade.top(limit).await {
        Ok(arbitrages) => {
            let rows: Vec<_> = arbitrages
                .iter()
                .filter_map(|a| arb_core::TopRow::try_from(a).ok())
                .collect();
            HttpResponse::Ok().json(rows)
        }
        Err(e) => error_response(e),
    }
}

/// Configures the `/api` scope. The `/ws` scope is mounted separately
/// in `main.rs` since actix-ws routes aren't plain `HttpResponse` handlers.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/exchanges", web::get().to(get_exchanges))
            .route("/exchanges/{exchange}/pairs", web::get().to(get_pairs))
            .route(
                "/exchanges/{exchange}/price/{pair}",
                web::get().to(get_price),
            )
            .route("/top", web::get().to(get_top)),
    );
}
