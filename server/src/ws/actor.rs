use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use std::time::Duration;
use tokio::time::{interval, timeout};

use crate::db::models::UserId;
use crate::dm::delivery;
use crate::presence::publisher::publish_status;
use crate::state::AppState;
use crate::ws::protocol::{self, send_error};
use crate::ws::session::{Effect, Input, Session};
use crate::ws::{ConnectionId, ConnectionSender};

/// Close code for a connection that stopped answering pings.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush the final close frame.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// One live connection: its id, its outbound channel and the shared state
/// the session's effects act on.
struct Connection {
    id: ConnectionId,
    tx: ConnectionSender,
    state: AppState,
}

/// Run the actor-per-connection pattern for an upgraded WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes inbound frames and feeds them to the session
///
/// Inbound events of one connection are handled one at a time, in arrival
/// order; other connections run concurrently. Whatever ends the reader loop,
/// the session sees a Disconnect and deregisters the connection.
pub async fn run_connection(socket: WebSocket, state: AppState, claimed: Option<UserId>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let conn = Connection {
        id: ConnectionId::next(),
        tx,
        state,
    };

    let mut session = conn.apply(Session::new(), Input::Handshake(claimed)).await;
    if session.is_closed() {
        // Let the writer flush the close frame, then finish
        drop(conn);
        let _ = writer_handle.await;
        return;
    }

    tracing::info!(
        user_id = ?session.user_id(),
        connection_id = conn.id.get(),
        "WebSocket actor started"
    );

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = conn.tx.clone();
    let heartbeat = conn.state.heartbeat;
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(heartbeat.ping_interval());
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died, connection is gone
                break;
            }

            match timeout(heartbeat.pong_timeout(), pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    let mut writer_done = false;
    loop {
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            // The writer stops when the socket breaks or after a keepalive close
            _ = &mut writer_handle => {
                writer_done = true;
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    session = conn.handle_frame(session, text.as_str().as_bytes()).await;
                }
                Message::Binary(data) => {
                    session = conn.handle_frame(session, &data).await;
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = conn.tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = conn.id.get(),
                        reason = ?frame,
                        "Client initiated close"
                    );
                    let _ = conn.tx.send(Message::Close(None));
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = conn.id.get(),
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = conn.id.get(), "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    let user_id = session.user_id();
    conn.apply(session, Input::Disconnect).await;

    if !writer_done {
        // No-op if a close frame is already queued; the writer stops at the first
        let _ = conn.tx.send(Message::Close(None));
        if timeout(WRITER_FLUSH_TIMEOUT, &mut writer_handle).await.is_err() {
            writer_handle.abort();
        }
    }

    tracing::info!(
        user_id = ?user_id,
        connection_id = conn.id.get(),
        "WebSocket actor stopped"
    );
}

impl Connection {
    /// Decode one inbound frame and run it through the session.
    /// Undecodable frames are answered with an error event; the connection
    /// stays open.
    async fn handle_frame(&self, session: Session, data: &[u8]) -> Session {
        match protocol::decode(data) {
            Ok(event) => self.apply(session, Input::Event(event)).await,
            Err(e) => {
                tracing::debug!(
                    user_id = ?session.user_id(),
                    connection_id = self.id.get(),
                    error = %e.0,
                    "Failed to decode inbound event"
                );
                send_error(&self.tx, 400, "Unknown or malformed event", None);
                session
            }
        }
    }

    /// Step the session and carry out its effects in order.
    async fn apply(&self, session: Session, input: Input) -> Session {
        let (next, effects) = session.step(input);
        for effect in effects {
            self.execute(effect).await;
        }
        next
    }

    async fn execute(&self, effect: Effect) {
        let state = &self.state;
        match effect {
            Effect::Reject { code, reason } => {
                tracing::warn!(
                    connection_id = self.id.get(),
                    code = code,
                    reason = reason,
                    "WebSocket handshake rejected"
                );
                let _ = self.tx.send(Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })));
            }
            Effect::Register { user_id } => {
                if state.presence.register(user_id, self.id, self.tx.clone()) {
                    publish_status(state.users.clone(), &state.presence, user_id, true).await;
                }
            }
            Effect::SendMessage {
                sender_id,
                receiver_id,
                content,
            } => {
                if let Err(e) = delivery::send_private_message(
                    state,
                    &self.tx,
                    sender_id,
                    receiver_id,
                    content,
                )
                .await
                {
                    self.report_store_failure(protocol::EVENT_PRIVATE_MESSAGE, &e);
                }
            }
            Effect::MarkRead {
                reader_id,
                sender_id,
            } => {
                if let Err(e) =
                    delivery::mark_conversation_read(state, reader_id, sender_id).await
                {
                    self.report_store_failure(protocol::EVENT_MESSAGE_READ, &e);
                }
            }
            Effect::Typing {
                user_id,
                receiver_id,
            } => {
                delivery::relay_typing(state, user_id, receiver_id);
            }
            Effect::Deregister { user_id } => {
                if state.presence.deregister(user_id, self.id) {
                    publish_status(state.users.clone(), &state.presence, user_id, false).await;
                }
            }
        }
    }

    fn report_store_failure(&self, event: &str, e: &crate::error::StoreError) {
        tracing::error!(
            connection_id = self.id.get(),
            event = event,
            error = %e,
            "Persistence failed, event not delivered"
        );
        let (code, message) = if e.is_constraint_violation() {
            (422, "Unknown user")
        } else {
            (500, "Message store unavailable")
        };
        send_error(&self.tx, code, message, Some(event));
    }
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
/// Stops after forwarding a close frame.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() {
            break;
        }
        if is_close {
            break;
        }
    }
    let _ = ws_sender.close().await;
}
