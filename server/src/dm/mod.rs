//! Private messaging between two users: the socket relay operations and the
//! HTTP history/read endpoints built on the same store.

pub mod delivery;
pub mod messages;
