//! Transport abstraction and split functionality.
//!
//! This module provides the [`DeviceTransport`] trait for abstracting over
//! different async byte streams, and the [`split`] function for creating
//! reader/writer pairs.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::reader::ConsoleReader;
use crate::writer::CommandWriter;

/// A transport that can be split into separate read and write halves.
///
/// This abstracts over TCP and in-memory streams so that the pipeline and
/// everything above it can be driven by a scripted fake device in tests.
pub trait DeviceTransport: Send + 'static {
    /// The read half type.
    type Read: AsyncRead + Unpin + Send + 'static;
    /// The write half type.
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split the transport into separate read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl DeviceTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a transport into a console reader and command writer pair.
///
/// # Example
///
/// ```ignore
/// use transport::split;
/// use tokio::net::TcpStream;
///
/// let stream = TcpStream::connect("192.168.1.20:8085").await?;
/// let (reader, writer) = split(stream);
/// ```
pub fn split<T: DeviceTransport>(transport: T) -> (ConsoleReader<T::Read>, CommandWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (ConsoleReader::new(read), CommandWriter::new(write))
}
