//! Online presence: which users are reachable, through which connections,
//! and the broadcast of online/offline transitions.

pub mod publisher;
pub mod registry;
pub mod routes;

pub use registry::PresenceRegistry;
