//! Per-session read loop.
//!
//! Consumes inbound frames, decodes envelopes and turns them into
//! [`Registry`] calls. Malformed input is answered with a notice on the
//! session's own queue; only connection failures end the loop.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::domain::envelope::{self, INVALID_ACTION, INVALID_MESSAGE};
use crate::domain::{Enqueue, Envelope, Registry, Session};
use crate::error::ConnectionError;

use super::transport::{Frame, FrameReader};

/// Runs until the connection fails or the session starts closing, then
/// removes the session from the registry.
pub async fn read_pump<R: FrameReader>(
    session: Arc<Session>,
    mut reader: R,
    registry: Arc<Registry>,
    config: SessionConfig,
) {
    let session_id = session.id();
    let outcome = loop {
        let frame = tokio::select! {
            biased;
            () = session.closing() => break Ok(()),
            read = tokio::time::timeout(config.pong_wait, reader.read_frame()) => match read {
                Ok(Ok(frame)) => frame,
                Ok(Err(err)) => break Err(err),
                Err(_) => break Err(ConnectionError::Timeout(config.pong_wait)),
            },
        };

        if frame.len() > config.max_message_size {
            break Err(ConnectionError::FrameTooLarge {
                size: frame.len(),
                limit: config.max_message_size,
            });
        }

        match frame {
            Frame::Text(text) => process(&registry, &session, text.as_bytes()).await,
            Frame::Binary(data) => process(&registry, &session, &data).await,
            Frame::Ping(_) | Frame::Pong(_) => {}
            Frame::Close => break Err(ConnectionError::Closed),
        }
    };

    match outcome {
        Ok(()) => tracing::debug!(%session_id, "read pump stopped: session closing"),
        Err(err) if err.is_graceful() => tracing::debug!(%session_id, "peer disconnected"),
        Err(err) => tracing::warn!(%session_id, error = %err, "read failed"),
    }

    registry.remove_session(&session).await;
}

/// Handles one inbound data frame.
pub(crate) async fn process(registry: &Registry, session: &Session, raw: &[u8]) {
    let normalized = envelope::normalize(raw);
    let envelope = match Envelope::decode(&normalized) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::debug!(session_id = %session.id(), error = %err, "undecodable frame");
            reply(registry, session, INVALID_MESSAGE);
            return;
        }
    };

    match envelope {
        Envelope::Subscribe { topic } => {
            registry.subscribe(session, &topic).await;
        }
        Envelope::Publish { topic, payload } if payload.is_empty() => {
            tracing::debug!(session_id = %session.id(), %topic, "empty publish ignored");
        }
        Envelope::Publish { topic, payload } => {
            let delivered = registry.publish(&topic, &payload).await;
            tracing::debug!(session_id = %session.id(), %topic, delivered, "publish");
        }
        Envelope::Unknown { action } => {
            tracing::debug!(session_id = %session.id(), %action, "unknown action");
            reply(registry, session, INVALID_ACTION);
        }
    }
}

/// Queues a notice for the sender. A full queue drops it like any other
/// message.
fn reply(registry: &Registry, session: &Session, notice: &str) {
    match session.notify(notice) {
        Enqueue::Queued | Enqueue::Closed => {}
        Enqueue::Full { dropped } => {
            registry.record_dropped();
            tracing::debug!(session_id = %session.id(), notice, dropped, "notice dropped, queue full");
        }
    }
}
