//! WebSocket layer: connection adapter, session pumps, upgrade handler.
//!
//! Every connection at `/ws` becomes a session with two tasks:
//!
//! - the read pump, which decodes envelopes and calls the registry,
//! - the write pump, which drains the outbound queue and pings the peer.
//!
//! Either pump failing tears the whole session down.

pub mod connection;
pub mod handler;
pub mod read_pump;
pub mod transport;
pub mod write_pump;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{SessionHandle, spawn_session};
pub use transport::{Frame, FrameReader, FrameWriter};
