//! # topichub
//!
//! Topic-based publish/subscribe hub over WebSocket.
//!
//! Peers connect to `/ws`, subscribe to string topics and publish JSON
//! payloads to them. Delivery is best-effort and at-most-once: nothing is
//! persisted, acknowledged or replayed.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── Upgrade handler (ws/handler)
//!     │
//!     ├── Read pump ──► Registry ──► Outbound queues ──► Write pump
//!     │   (ws/read_pump)   (domain/)   (domain/session)    (ws/write_pump)
//!     │
//!     └── HTTP: home page, health (api/)
//! ```
//!
//! Each connection is a [`domain::Session`] with two tasks. The
//! [`domain::Registry`] is created once at startup and handed to every
//! connection through [`app_state::AppState`].

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
