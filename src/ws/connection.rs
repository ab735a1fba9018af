//! Session bootstrap for a single WebSocket connection.
//!
//! Creates the [`Session`], registers it, and spawns its read and write
//! pumps as independent tasks. Each pump owns one half of the connection.

use std::sync::Arc;

use axum::extract::ws::WebSocket;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::read_pump::read_pump;
use super::transport::{FrameReader, FrameWriter};
use super::write_pump::write_pump;
use crate::config::SessionConfig;
use crate::domain::{Registry, Session};

/// A running session and its two pump tasks.
#[derive(Debug)]
pub struct SessionHandle {
    /// The shared session state.
    pub session: Arc<Session>,
    read: JoinHandle<()>,
    write: JoinHandle<()>,
}

impl SessionHandle {
    /// Waits for both pumps to finish.
    ///
    /// A panicking pump is logged; the session has already been removed by
    /// its partner by then, or is removed here.
    pub async fn join(self, registry: &Registry) {
        let (read, write) = tokio::join!(self.read, self.write);
        for (pump, result) in [("read", read), ("write", write)] {
            if let Err(err) = result {
                tracing::error!(session_id = %self.session.id(), pump, error = %err, "pump task failed");
                registry.remove_session(&self.session).await;
            }
        }
    }
}

/// Registers a new session for an established connection and spawns its
/// pumps.
pub async fn spawn_session<R, W>(
    reader: R,
    writer: W,
    remote: impl Into<String>,
    registry: Arc<Registry>,
    config: SessionConfig,
) -> SessionHandle
where
    R: FrameReader,
    W: FrameWriter,
{
    let (session, outbox) = Session::new(remote, config.outbound_capacity);
    registry.add_session(Arc::clone(&session)).await;
    session.activate();

    let write = tokio::spawn(write_pump(
        Arc::clone(&session),
        outbox,
        writer,
        Arc::clone(&registry),
        config,
    ));
    let read = tokio::spawn(read_pump(Arc::clone(&session), reader, registry, config));

    SessionHandle {
        session,
        read,
        write,
    }
}

/// Serves an upgraded WebSocket until its session is torn down.
pub async fn run_connection(
    socket: WebSocket,
    remote: String,
    registry: Arc<Registry>,
    config: SessionConfig,
) {
    let (sink, stream) = socket.split();
    let handle = spawn_session(stream, sink, remote, Arc::clone(&registry), config).await;
    handle.join(&registry).await;
}
