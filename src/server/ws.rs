//! WebSocket Handler
//!
//! Upgrades the HTTP connection and hands the socket to the hub, which owns
//! it from then on.

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use std::sync::Arc;

use crate::hub::Hub;
use crate::transport::WsConnection;

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(hub): State<Hub>) -> Response {
    ws.on_upgrade(move |socket| async move {
        let id = hub.attach(Arc::new(WsConnection::new(socket))).await;
        tracing::debug!(connection_id = %id, "WebSocket upgraded");
    })
}
