//! Frame-level connection adapter.
//!
//! The pumps never see axum types. They talk to a [`FrameReader`] and a
//! [`FrameWriter`], which the two halves of a split axum [`WebSocket`]
//! implement. Deadlines are not part of the adapter: the pumps wrap each
//! call in [`tokio::time::timeout`].

use std::future::Future;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::error::ConnectionError;

/// One WebSocket frame, independent of the transport library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 data frame.
    Text(String),
    /// Binary data frame.
    Binary(Vec<u8>),
    /// Liveness probe.
    Ping(Vec<u8>),
    /// Answer to a probe.
    Pong(Vec<u8>),
    /// Orderly shutdown.
    Close,
}

impl Frame {
    /// Size of the frame's payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(data) | Self::Ping(data) | Self::Pong(data) => data.len(),
            Self::Close => 0,
        }
    }

    /// Returns `true` if the frame carries no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Self::Text(text.as_str().to_owned()),
            Message::Binary(data) => Self::Binary(data.to_vec()),
            Message::Ping(data) => Self::Ping(data.to_vec()),
            Message::Pong(data) => Self::Pong(data.to_vec()),
            Message::Close(_) => Self::Close,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Self::text(text),
            Frame::Binary(data) => Self::binary(data),
            Frame::Ping(data) => Self::Ping(data.into()),
            Frame::Pong(data) => Self::Pong(data.into()),
            Frame::Close => Self::Close(None),
        }
    }
}

/// Read side of a connection. Owned by the read pump.
pub trait FrameReader: Send + 'static {
    /// Waits for the next inbound frame.
    ///
    /// A stream that has ended yields [`ConnectionError::Closed`].
    fn read_frame(&mut self) -> impl Future<Output = Result<Frame, ConnectionError>> + Send;
}

/// Write side of a connection. Owned by the write pump.
pub trait FrameWriter: Send + 'static {
    /// Sends one frame.
    fn write_frame(&mut self, frame: Frame)
    -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// Flushes and closes the underlying connection.
    fn close(&mut self) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

impl FrameReader for SplitStream<WebSocket> {
    async fn read_frame(&mut self) -> Result<Frame, ConnectionError> {
        match self.next().await {
            Some(Ok(message)) => Ok(Frame::from(message)),
            Some(Err(err)) => Err(ConnectionError::Transport(err)),
            None => Err(ConnectionError::Closed),
        }
    }
}

impl FrameWriter for SplitSink<WebSocket, Message> {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.send(Message::from(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        SinkExt::close(self).await?;
        Ok(())
    }
}
