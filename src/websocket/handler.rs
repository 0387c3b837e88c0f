//! `GET /ws`: authenticate, register the session, pump messages until either
//! side goes away

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::{ClientMessage, WsMessage};
use crate::core_types::AccountId;
use crate::gateway::middleware::{authenticate, bearer_token};
use crate::gateway::state::AppState;
use crate::gateway::types::ApiError;
use crate::notification::SessionRegistry;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT, for browser clients that cannot set headers on the upgrade
    pub token: Option<String>,
}

/// `?token=` takes precedence over the Authorization header
fn resolve_token<'a>(query: &'a WsQuery, headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
    match query.token.as_deref() {
        Some(token) => Ok(token),
        None => bearer_token(headers),
    }
}

/// Reply for one client text frame
fn reply_to(text: &str) -> WsMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => WsMessage::Pong,
        Err(_) => WsMessage::Error {
            message: "unsupported message".into(),
        },
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user = match resolve_token(&query, &headers).and_then(|token| authenticate(&state, token)) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let registry = state.sessions().clone();
    ws.on_upgrade(move |socket| run_session(socket, user.account_id, registry))
}

async fn run_session(socket: WebSocket, user_id: AccountId, registry: Arc<dyn SessionRegistry>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

    let session_id = registry.register(user_id, tx.clone());
    info!(user_id, session_id, "WebSocket session opened");
    let _ = tx.send(WsMessage::Connected { user_id });

    // registry pushes and replies share one outbound channel
    let mut outbound = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&msg) else {
                continue;
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Message::Text(text) => {
                    let _ = tx.send(reply_to(&text));
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut outbound => inbound.abort(),
        _ = &mut inbound => outbound.abort(),
    }

    registry.unregister(user_id, session_id);
    debug!(user_id, session_id, "WebSocket session closed");
}
