use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, Stream, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use syntra_types::api::Claims;
use syntra_types::events::ClientCommand;

use crate::gateway::Gateway;
use crate::rooms::{Credential, SessionId};

/// Server sends a Ping every 15 seconds. Two consecutive missed Pongs (~30s)
/// drop the connection, which takes the session out of its room.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Wrap the token a client connected with. Decoding is best effort and only
/// feeds log labels; an invalid token does not refuse the connection.
pub fn read_credential(token: String, jwt_secret: &str) -> Credential {
    let username = match decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims.username),
        Err(e) => {
            debug!("realtime token did not decode: {}", e);
            None
        }
    };
    Credential { token, username }
}

/// Run one realtime session until the socket closes.
pub async fn handle_connection(socket: WebSocket, gateway: Gateway, credential: Option<Credential>) {
    let (mut sender, receiver) = socket.split();

    let (session_id, mut outbound) = gateway.rooms().connect(credential).await;
    let label = gateway.rooms().label(session_id).await;
    info!("{} connected (session {})", label, session_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = outbound.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode {}: {}", event.name(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let (stop_tx, stop_rx) = oneshot::channel();
    let mut recv_task = tokio::spawn(read_commands(
        receiver,
        gateway.clone(),
        session_id,
        label.clone(),
        pong_flag_recv,
        stop_rx,
    ));

    // Wait for either task to finish. A dead send side asks the reader to stop
    // instead of aborting it, so a command already read still runs to the end.
    let send_finished = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if send_finished {
        let _ = stop_tx.send(());
        if let Err(e) = recv_task.await {
            warn!("{} reader ended abnormally: {}", label, e);
        }
    } else {
        send_task.abort();
    }

    gateway.rooms().disconnect(session_id).await;
    info!("{} disconnected (session {})", label, session_id);
}

/// Parse and dispatch client frames until the socket ends or `stop` fires.
/// `stop` is only checked between frames, never while a command is running.
async fn read_commands<S>(
    mut receiver: S,
    gateway: Gateway,
    session_id: SessionId,
    label: String,
    pong_received: Arc<AtomicBool>,
    mut stop: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            msg = receiver.next() => msg,
            _ = &mut stop => break,
        };
        let Some(Ok(msg)) = msg else { break };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => gateway.handle_command(session_id, cmd).await,
                Err(e) => {
                    warn!(
                        "{} bad event: {} -- raw: {}",
                        label,
                        e,
                        text.chars().take(200).collect::<String>()
                    );
                }
            },
            Message::Pong(_) => {
                pong_received.store(true, Ordering::Release);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
