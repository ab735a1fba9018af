//! Per-session write loop.
//!
//! The only code that writes to a connection. Drains the session's outbound
//! queue, probes the peer with pings, and on teardown sends a close frame
//! and releases the connection exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::domain::{Outbox, Registry, Session};
use crate::error::ConnectionError;

use super::transport::{Frame, FrameWriter};

/// Why the write loop ended.
#[derive(Debug)]
enum Exit {
    /// Teardown was requested or the queue closed.
    Shutdown,
    /// Sending a data frame failed.
    WriteFailed(ConnectionError),
    /// Sending a ping failed; the peer is presumed dead.
    ProbeFailed(ConnectionError),
}

/// Runs until teardown is requested or a write fails, then removes the
/// session from the registry and closes the connection.
pub async fn write_pump<W: FrameWriter>(
    session: Arc<Session>,
    mut outbox: Outbox,
    mut writer: W,
    registry: Arc<Registry>,
    config: SessionConfig,
) {
    let session_id = session.id();
    let period = config.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;
            () = session.closing() => break Exit::Shutdown,
            message = outbox.recv() => {
                let Some(message) = message else {
                    break Exit::Shutdown;
                };
                let frame = Frame::Text(message.to_string());
                if let Err(err) = send(&mut writer, frame, config.write_wait).await {
                    break Exit::WriteFailed(err);
                }
            }
            _ = ping.tick() => {
                tracing::trace!(%session_id, "ping");
                if let Err(err) = send(&mut writer, Frame::Ping(Vec::new()), config.write_wait).await {
                    break Exit::ProbeFailed(err);
                }
            }
        }
    };

    match &exit {
        Exit::Shutdown => {
            if let Err(err) = send(&mut writer, Frame::Close, config.write_wait).await {
                tracing::debug!(%session_id, error = %err, "close frame not delivered");
            }
        }
        Exit::WriteFailed(err) => tracing::warn!(%session_id, error = %err, "write failed"),
        Exit::ProbeFailed(err) => tracing::warn!(%session_id, error = %err, "ping failed, peer presumed dead"),
    }

    registry.remove_session(&session).await;

    // A peer that stopped reading leaves unflushed frames in the sink, so the
    // close handshake gets the same deadline as any other write.
    match tokio::time::timeout(config.write_wait, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::debug!(%session_id, error = %err, "connection close failed"),
        Err(_) => tracing::debug!(%session_id, "connection close timed out"),
    }
    drop(writer);
    session.mark_closed();

    let lifetime = chrono::Utc::now() - session.connected_at();
    tracing::info!(
        %session_id,
        remote = session.remote(),
        lifetime_ms = lifetime.num_milliseconds(),
        dropped = session.dropped(),
        "session closed"
    );
}

/// Writes one frame under `deadline`.
async fn send<W: FrameWriter>(
    writer: &mut W,
    frame: Frame,
    deadline: Duration,
) -> Result<(), ConnectionError> {
    match tokio::time::timeout(deadline, writer.write_frame(frame)).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Timeout(deadline)),
    }
}
