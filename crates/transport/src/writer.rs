//! Console command writer.
//!
//! This module provides [`CommandWriter`], a typed wrapper around a framed
//! async writer for sending commands to the device.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::ConsoleCodec;
use crate::error::TransportError;

pin_project! {
    /// An async sink for console commands.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use transport::CommandWriter;
    ///
    /// let mut writer = CommandWriter::new(tcp_write_half);
    /// writer.send("bt").await?;
    /// ```
    pub struct CommandWriter<W> {
        #[pin]
        inner: FramedWrite<W, ConsoleCodec>,
    }
}

impl<W> CommandWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a new command writer from an async write destination.
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, ConsoleCodec::new()),
        }
    }

    /// Write a single command line and flush it.
    pub async fn send(&mut self, command: impl Into<String>) -> Result<(), TransportError> {
        use futures::SinkExt;
        SinkExt::send(&mut self.inner, command.into()).await
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Consume the writer and return the underlying destination.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W> Sink<String> for CommandWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: String) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}
