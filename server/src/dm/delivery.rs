//! Relay operations shared by the socket and the HTTP endpoints.
//!
//! Persistence happens first; nothing fans out unless the store accepted the
//! write. Fan-out itself never fails: offline receivers simply get nothing
//! and fetch the history when they come back.

use crate::db::models::{PrivateMessage, UserId};
use crate::db::store::blocking;
use crate::error::StoreError;
use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::{send_event, ServerEvent};
use crate::ws::ConnectionSender;

/// Store a new message, push it to the receiver's live connections and echo
/// it to the sending connection as a delivery acknowledgment.
pub async fn send_private_message(
    state: &AppState,
    origin: &ConnectionSender,
    sender_id: UserId,
    receiver_id: UserId,
    content: String,
) -> Result<PrivateMessage, StoreError> {
    let message = blocking(state.messages.clone(), move |store| {
        store.create_message(sender_id, receiver_id, &content)
    })
    .await?;

    let delivered = send_to_user(
        &state.presence,
        receiver_id,
        &ServerEvent::Message(message.clone()),
    );
    send_event(origin, &ServerEvent::MessageSent(message.clone()));

    tracing::debug!(
        message_id = message.id,
        sender_id = sender_id,
        receiver_id = receiver_id,
        delivered = delivered,
        "Private message relayed"
    );

    Ok(message)
}

/// Mark everything `sender_id` sent to `reader_id` as read and send a read
/// receipt to all of the sender's live connections. Returns the number of
/// messages that flipped.
pub async fn mark_conversation_read(
    state: &AppState,
    reader_id: UserId,
    sender_id: UserId,
) -> Result<usize, StoreError> {
    let updated = blocking(state.messages.clone(), move |store| {
        store.mark_read(sender_id, reader_id)
    })
    .await?;

    send_to_user(
        &state.presence,
        sender_id,
        &ServerEvent::MessageRead { reader_id },
    );

    tracing::debug!(
        reader_id = reader_id,
        sender_id = sender_id,
        updated = updated,
        "Messages marked as read"
    );

    Ok(updated)
}

/// Best-effort typing signal; dropped when the receiver is offline.
pub fn relay_typing(state: &AppState, user_id: UserId, receiver_id: UserId) {
    send_to_user(
        &state.presence,
        receiver_id,
        &ServerEvent::Typing { user_id },
    );
}
