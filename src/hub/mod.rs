//! Chat hub core: wire protocol, shared membership state, and the
//! coordinator/vote machinery every connection task drives.
pub mod authority;
pub mod codec;
pub mod command;
pub mod error;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod transport;
pub mod vote;
