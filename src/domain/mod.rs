//! Domain layer: sessions, envelopes, and the subscription registry.
//!
//! Nothing in this module touches the network. Sessions expose a bounded
//! outbound queue and a lifecycle signal; the registry routes published
//! payloads onto those queues.

pub mod envelope;
pub mod registry;
pub mod session;
pub mod session_id;

pub use envelope::Envelope;
pub use registry::Registry;
pub use session::{Enqueue, OutboundMessage, Outbox, Session, SessionState};
pub use session_id::SessionId;
