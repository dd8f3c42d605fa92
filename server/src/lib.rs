//! Nova real-time server library: presence tracking and private messaging
//! over WebSockets, plus the HTTP read paths over the same message store.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod db;
pub mod dm;
pub mod error;
pub mod presence;
pub mod routes;
pub mod state;
pub mod ws;
