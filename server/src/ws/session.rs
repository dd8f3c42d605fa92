//! Per-connection state machine.
//!
//! Transitions are pure: [`Session::step`] takes the current state and one
//! input and returns the next state plus the effects the connection actor
//! must carry out. Nothing here touches the registry, the store or the
//! socket, so every transition is testable without a transport.

use crate::db::models::UserId;
use crate::ws::protocol::ClientEvent;

/// Close code sent when the handshake carries no usable user identity.
pub const CLOSE_MISSING_IDENTITY: u16 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    /// Waiting for the handshake identity.
    Connecting,
    /// Registered and accepting events for `user_id`.
    Open { user_id: UserId },
    /// Terminal.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Identity claim from the upgrade request, if any.
    Handshake(Option<UserId>),
    Event(ClientEvent),
    /// Transport-level disconnect: client close, network error or keepalive timeout.
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Close the socket without touching any shared state.
    Reject { code: u16, reason: &'static str },
    /// Add this connection to the registry; publish online if it is the user's first.
    Register { user_id: UserId },
    /// Persist, relay to the receiver, echo to this connection.
    SendMessage {
        sender_id: UserId,
        receiver_id: UserId,
        content: String,
    },
    /// Flip `sender_id -> reader_id` messages to read, then notify the sender.
    MarkRead { reader_id: UserId, sender_id: UserId },
    /// Relay an ephemeral typing signal; dropped if the receiver is offline.
    Typing { user_id: UserId, receiver_id: UserId },
    /// Remove this connection from the registry; publish offline if it was the last.
    Deregister { user_id: UserId },
}

impl Session {
    pub fn new() -> Self {
        Session::Connecting
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Session::Closed)
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Session::Open { user_id } => Some(*user_id),
            _ => None,
        }
    }

    pub fn step(self, input: Input) -> (Session, Vec<Effect>) {
        match (self, input) {
            (Session::Connecting, Input::Handshake(Some(user_id))) => (
                Session::Open { user_id },
                vec![Effect::Register { user_id }],
            ),
            (Session::Connecting, Input::Handshake(None)) => (
                Session::Closed,
                vec![Effect::Reject {
                    code: CLOSE_MISSING_IDENTITY,
                    reason: "Missing user identity",
                }],
            ),
            // Nothing was registered yet, so there is nothing to clean up
            (Session::Connecting, Input::Disconnect) => (Session::Closed, Vec::new()),
            (Session::Connecting, Input::Event(_)) => (Session::Connecting, Vec::new()),

            (Session::Open { user_id }, Input::Event(event)) => {
                let effect = match event {
                    ClientEvent::SendMessage {
                        receiver_id,
                        content,
                    } => Effect::SendMessage {
                        sender_id: user_id,
                        receiver_id,
                        content,
                    },
                    ClientEvent::MarkRead { sender_id } => Effect::MarkRead {
                        reader_id: user_id,
                        sender_id,
                    },
                    ClientEvent::Typing { receiver_id } => Effect::Typing {
                        user_id,
                        receiver_id,
                    },
                };
                (Session::Open { user_id }, vec![effect])
            }
            (Session::Open { user_id }, Input::Disconnect) => {
                (Session::Closed, vec![Effect::Deregister { user_id }])
            }
            // The identity is fixed for the lifetime of the connection
            (open @ Session::Open { .. }, Input::Handshake(_)) => (open, Vec::new()),

            (Session::Closed, _) => (Session::Closed, Vec::new()),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
