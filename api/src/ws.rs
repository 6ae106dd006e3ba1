use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::AppState;

/// GET /ws/{exchange}/price/{pair} — streams `LivePrice` frames shaped
/// `{pair, exchange, price, time}` for as long as the client stays
/// connected, per `QueryFacade::live_price`.
pub async fn live_price_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, actix_web::Error> {
    let (exchange, pair) = path.into_inner();
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let (tx, mut rx) = mpsc::channel(arb_core::exchange::SUBSCRIBER_CHANNEL_DEPTH);

    if let Err(e) = state.facade.live_price(&exchange, &pair, tx).await {
        warn!(exchange = %exchange, pair = %pair, error = %e, "failed to subscribe to live price");
        let _ = session.close(None).await;
        return Ok(response);
    }

    info!(exchange = %exchange, pair = %pair, "websocket client subscribed");

    let mut forward_session = session.clone();
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&frame) else {
                continue;
            };
            if forward_session.text(json).await.is_err() {
                break;
            }
        }
    });

    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Ping(bytes) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    info!("websocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(response)
}
