//! Per-connection session state.
//!
//! A [`Session`] is shared (behind an `Arc`) between its two pumps and the
//! [`super::Registry`]. The connection itself is not stored here: its read
//! half belongs to the read pump and its write half to the write pump. What
//! the session does hold is everything those parties need to agree on:
//!
//! - the bounded outbound queue (many producers, one consumer),
//! - the lifecycle state, which doubles as the shutdown signal,
//! - the dropped-message counter used by the overflow policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use super::SessionId;

/// A message waiting in a session's outbound queue.
///
/// Shared so that fan-out to many subscribers clones a pointer, not the text.
pub type OutboundMessage = Arc<str>;

/// Consumer end of a session's outbound queue, owned by the write pump.
pub type Outbox = mpsc::Receiver<OutboundMessage>;

/// Lifecycle of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Created, not yet registered.
    Connecting,
    /// Registered, both pumps running.
    Active,
    /// Teardown requested; pumps are winding down.
    Closing,
    /// Connection released.
    Closed,
}

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    /// The message is in the queue.
    Queued,
    /// The queue was full and the message was dropped.
    Full {
        /// Lifetime number of messages dropped for this session.
        dropped: u64,
    },
    /// The session is shutting down; nobody will read the queue.
    Closed,
}

/// State and identity of one live connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    remote: String,
    connected_at: DateTime<Utc>,
    outbox: mpsc::Sender<OutboundMessage>,
    state: watch::Sender<SessionState>,
    dropped: AtomicU64,
}

impl Session {
    /// Creates a session in the `Connecting` state together with the
    /// consumer end of its outbound queue.
    ///
    /// A `capacity` of zero is treated as one.
    #[must_use]
    pub fn new(remote: impl Into<String>, capacity: usize) -> (Arc<Self>, Outbox) {
        let (outbox, rx) = mpsc::channel(capacity.max(1));
        let (state, _) = watch::channel(SessionState::Connecting);
        let session = Self {
            id: SessionId::new(),
            remote: remote.into(),
            connected_at: Utc::now(),
            outbox,
            state,
            dropped: AtomicU64::new(0),
        };
        (Arc::new(session), rx)
    }

    /// Unique id of this session.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Remote endpoint of the peer (`ip:port`).
    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// When the session was created.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Returns `true` once teardown has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() >= SessionState::Closing
    }

    /// Lifetime number of messages dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Moves `Connecting → Active`. No effect in any other state.
    pub fn activate(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Connecting {
                *state = SessionState::Active;
                true
            } else {
                false
            }
        });
    }

    /// Requests teardown: `Connecting | Active → Closing`.
    ///
    /// Returns `true` only for the call that performed the transition;
    /// every later call is a no-op returning `false`.
    pub fn close(&self) -> bool {
        let first = self.state.send_if_modified(|state| {
            if *state < SessionState::Closing {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        });
        if first {
            tracing::debug!(session_id = %self.id, "session closing");
        }
        first
    }

    /// Marks the connection as released. Implies [`Session::close`].
    pub fn mark_closed(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Closed {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
    }

    /// Resolves once teardown has been requested.
    ///
    /// Each pump calls this inside its `select!`; it returns immediately if
    /// the session is already closing.
    pub async fn closing(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail while we
        // hold a reference.
        let _ = rx.wait_for(|state| *state >= SessionState::Closing).await;
    }

    /// Queues `message` without waiting.
    ///
    /// Never blocks: a full queue drops the message and bumps the dropped
    /// counter, leaving the decision about the session to the caller.
    pub fn try_enqueue(&self, message: OutboundMessage) -> Enqueue {
        if self.is_closed() {
            return Enqueue::Closed;
        }
        match self.outbox.try_send(message) {
            Ok(()) => Enqueue::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed).saturating_add(1);
                Enqueue::Full { dropped }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Queues a server notice (such as `invalid message`) for this peer.
    pub fn notify(&self, notice: &str) -> Enqueue {
        self.try_enqueue(Arc::from(notice))
    }
}
