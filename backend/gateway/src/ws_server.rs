//! Live-update WebSocket: a baseline snapshot on connect, then one snapshot
//! per ledger broadcast.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::server::GatewayState;
use crate::ws_protocol::WsMessage;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscription = match state.ledger.subscribe().await {
        Ok(sub) => sub,
        Err(e) => {
            error!(error = %e, "Could not subscribe to live updates");
            let msg = WsMessage::Error {
                message: e.to_string(),
            };
            if let Ok(json) = serde_json::to_string(&msg) {
                let _ = sender.send(Message::Text(json)).await;
            }
            return;
        }
    };
    info!("Live update client connected");

    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<WsMessage>();

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                snapshot = subscription.next() => match snapshot {
                    Some(snapshot) => WsMessage::VoiceUpdate { data: snapshot.as_ref().clone() },
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to encode live update");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(WsMessage::Ping) => {
                        let _ = reply_tx.send(WsMessage::Pong);
                    }
                    Ok(other) => debug!(?other, "Ignoring client message"),
                    Err(_) => warn!("Received invalid JSON message: {}", text),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // If either side finishes, tear down the other; dropping the
    // subscription unsubscribes.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    info!("Live update client disconnected");
}
