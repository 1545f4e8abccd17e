//! Console output reader.
//!
//! This module provides [`ConsoleReader`], a typed wrapper around a framed
//! async reader that produces a stream of decoded text chunks.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::ConsoleCodec;
use crate::error::TransportError;

pin_project! {
    /// An async stream of console output.
    ///
    /// Chunk boundaries follow the socket reads and carry no meaning: a
    /// single line, or the prompt itself, may be split across chunks.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    /// use transport::ConsoleReader;
    ///
    /// let mut reader = ConsoleReader::new(tcp_read_half);
    ///
    /// while let Some(chunk) = reader.next().await {
    ///     print!("{}", chunk?);
    /// }
    /// ```
    pub struct ConsoleReader<R> {
        #[pin]
        inner: FramedRead<R, ConsoleCodec>,
    }
}

impl<R> ConsoleReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Create a new console reader from an async read source.
    pub fn new(reader: R) -> Self {
        Self {
            inner: FramedRead::new(reader, ConsoleCodec::new()),
        }
    }

    /// Get a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for ConsoleReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<String, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
