//! WebSocket transport for the fan-out router.
//!
//! Protocol: the server greets with `{"type":"hello"}`; a client picks a
//! device with `{"type":"sub","deviceId":"..."}` and gets `sub_ok` back, then
//! receives every processed reading for that device as a JSON text frame.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::AppState;
use crate::{ChannelConnection, ConnectionId};

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "sub")]
    Subscribe {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage<'a> {
    #[serde(rename = "hello")]
    Hello { msg: &'a str },
    #[serde(rename = "sub_ok")]
    SubscribeOk {
        #[serde(rename = "deviceId")]
        device_id: &'a str,
    },
}

fn encode(msg: &ServerMessage<'_>) -> String {
    serde_json::to_string(msg).unwrap_or_default()
}

/// Queue a protocol reply; `false` once the writer task has gone.
fn reply(tx: &mpsc::UnboundedSender<String>, conn_id: ConnectionId, msg: &ServerMessage<'_>) -> bool {
    // ---
    match tx.send(encode(msg)) {
        Ok(()) => true,
        Err(e) => {
            debug!("Observer {} writer gone, dropping reply: {}", conn_id, e);
            false
        }
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(telemetry): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, telemetry))
}

async fn handle_socket(socket: WebSocket, telemetry: AppState) {
    // ---
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let conn_id = telemetry
        .fanout()
        .register(Arc::new(ChannelConnection::new(tx.clone())));
    info!("Observer {} connected", conn_id);

    // Single writer: fan-out frames and protocol replies share one queue.
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut writer_alive = reply(&tx, conn_id, &ServerMessage::Hello { msg: "connected" });

    while writer_alive {
        let Some(Ok(msg)) = stream.next().await else {
            break;
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Subscribe { device_id }) => {
                    let device_id = device_id.trim();
                    if device_id.is_empty() {
                        continue;
                    }
                    telemetry.fanout().subscribe(conn_id, device_id);
                    debug!("Observer {} subscribed to {}", conn_id, device_id);
                    writer_alive = reply(&tx, conn_id, &ServerMessage::SubscribeOk { device_id });
                }
                Err(e) => debug!("Ignoring message from observer {}: {}", conn_id, e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    telemetry.fanout().unregister(conn_id);
    writer.abort();
    info!("Observer {} disconnected", conn_id);
}
