use crate::error::{AppError, Result};
use crate::tracker::DailySession;
use crate::view::DailyView;
use crate::ws::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

async fn send_message(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<()> {
    let json = serde_json::to_string(message)?;

    ws_sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| AppError::WebSocket(e.to_string()))
}

/// Handle a WebSocket connection bound to one daily session
pub async fn handle_connection(socket: WebSocket, session: DailySession, client_id: String) {
    info!("WebSocket client connected: {}", client_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut state = session.state();
    let handle = session.handle();

    // Replies to client requests share the socket with view pushes
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);

    let send_client_id = client_id.clone();
    let recv_client_id = client_id.clone();

    // Push the current view, then a new one on every tracker change
    let mut send_task = tokio::spawn(async move {
        let view = DailyView::from_snapshot(&state.borrow_and_update());
        if let Err(e) = send_message(&mut ws_sender, &ServerMessage::view(view)).await {
            error!("Failed to send initial view to {}: {}", send_client_id, e);
            return;
        }

        loop {
            let message = tokio::select! {
                changed = state.changed() => {
                    if changed.is_err() {
                        debug!("Session state closed for client {}", send_client_id);
                        break;
                    }
                    let view = DailyView::from_snapshot(&state.borrow_and_update());
                    ServerMessage::view(view)
                }
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };

            if let Err(e) = send_message(&mut ws_sender, &message).await {
                error!("Failed to send message to {}: {}", send_client_id, e);
                break;
            }
        }
    });

    // Handle incoming messages from WebSocket client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let msg = match msg_result {
                Ok(m) => m,
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
            };

            let reply = match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::SelectDate { date }) => {
                        debug!("Client {} selected {}", recv_client_id, date);
                        if let Err(e) = handle.select_date(date).await {
                            error!("Client {}: {}", recv_client_id, e);
                            break;
                        }
                        None
                    }
                    Ok(ClientMessage::Ping) => {
                        debug!("Received ping from client {}", recv_client_id);
                        Some(ServerMessage::pong())
                    }
                    Err(e) => {
                        warn!("Failed to parse client message: {}", e);
                        Some(ServerMessage::error(e.to_string(), "INVALID_MESSAGE"))
                    }
                },
                Message::Close(_) => {
                    info!("Client {} closed connection", recv_client_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => None,
                Message::Binary(_) => {
                    warn!("Received unexpected binary message from client {}", recv_client_id);
                    Some(ServerMessage::error(
                        "binary frames are not supported",
                        "INVALID_MESSAGE",
                    ))
                }
            };

            if let Some(reply) = reply {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            info!("Send task completed for client {}", client_id);
            recv_task.abort();
        }
        _ = &mut recv_task => {
            info!("Receive task completed for client {}", client_id);
            send_task.abort();
        }
    }

    // Releases the session's subscriptions
    drop(session);
    info!("WebSocket client disconnected: {}", client_id);
}
