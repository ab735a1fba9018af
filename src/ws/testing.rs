//! In-memory connection doubles for pump tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use super::transport::{Frame, FrameReader, FrameWriter};
use crate::error::ConnectionError;

/// Reader fed from a channel. Dropping the feed ends the stream.
#[derive(Debug)]
pub(crate) struct ScriptedReader {
    inbound: mpsc::UnboundedReceiver<Result<Frame, ConnectionError>>,
}

/// Test-side handle that pushes frames into a [`ScriptedReader`].
#[derive(Debug, Clone)]
pub(crate) struct Feed {
    tx: mpsc::UnboundedSender<Result<Frame, ConnectionError>>,
}

impl Feed {
    pub(crate) fn text(&self, text: &str) {
        let _ = self.tx.send(Ok(Frame::Text(text.to_string())));
    }

    pub(crate) fn frame(&self, frame: Frame) {
        let _ = self.tx.send(Ok(frame));
    }

    pub(crate) fn fail(&self, err: ConnectionError) {
        let _ = self.tx.send(Err(err));
    }
}

pub(crate) fn scripted_reader() -> (ScriptedReader, Feed) {
    let (tx, inbound) = mpsc::unbounded_channel();
    (ScriptedReader { inbound }, Feed { tx })
}

impl FrameReader for ScriptedReader {
    async fn read_frame(&mut self) -> Result<Frame, ConnectionError> {
        self.inbound
            .recv()
            .await
            .unwrap_or(Err(ConnectionError::Closed))
    }
}

/// Shared observations of a [`RecordingWriter`].
#[derive(Debug, Default)]
pub(crate) struct WriterProbe {
    pub(crate) fail_pings: AtomicBool,
    pub(crate) fail_writes: AtomicBool,
    pub(crate) closes: AtomicUsize,
}

/// Writer that forwards every frame to a channel.
#[derive(Debug)]
pub(crate) struct RecordingWriter {
    sent: mpsc::UnboundedSender<Frame>,
    probe: Arc<WriterProbe>,
}

pub(crate) fn recording_writer() -> (
    RecordingWriter,
    mpsc::UnboundedReceiver<Frame>,
    Arc<WriterProbe>,
) {
    let (sent, rx) = mpsc::unbounded_channel();
    let probe = Arc::new(WriterProbe::default());
    (
        RecordingWriter {
            sent,
            probe: Arc::clone(&probe),
        },
        rx,
        probe,
    )
}

fn broken_pipe() -> ConnectionError {
    ConnectionError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
}

impl FrameWriter for RecordingWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let is_ping = matches!(frame, Frame::Ping(_));
        if self.probe.fail_writes.load(Ordering::SeqCst)
            || (is_ping && self.probe.fail_pings.load(Ordering::SeqCst))
        {
            return Err(broken_pipe());
        }
        let _ = self.sent.send(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        let _ = self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Receives frames until the first non-ping one.
pub(crate) async fn next_data_frame(rx: &mut mpsc::UnboundedReceiver<Frame>) -> Option<Frame> {
    while let Some(frame) = rx.recv().await {
        if !matches!(frame, Frame::Ping(_)) {
            return Some(frame);
        }
    }
    None
}
