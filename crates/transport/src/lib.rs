//! Async transport for the device debugger console.
//!
//! The device exposes an interactive shell on a TCP port. There is no
//! framing and no request identifiers: commands are CRLF terminated lines
//! and a reply is "everything until the prompt shows up again". This crate
//! turns that stream into something request shaped.
//!
//! # Architecture
//!
//! - [`ConsoleCodec`] decodes raw bytes into text chunks and encodes command lines
//! - [`ConsoleReader`] wraps an `AsyncRead` to produce a `Stream` of text chunks
//! - [`CommandWriter`] wraps an `AsyncWrite` to provide a `Sink` for command lines
//! - [`settle`] drains stale output left over from a previous session
//! - [`RequestPipeline`] serialises commands so that only one awaits the prompt
//!   at a time, and reports all other output as [`PipelineEvent`]s
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//!
//! let (mut reader, writer) = transport::connect(("192.168.1.20", transport::DEFAULT_DEBUG_PORT)).await?;
//! transport::settle(&mut reader, transport::DEFAULT_SETTLE_PERIOD).await?;
//!
//! let (pipeline, mut events) = transport::RequestPipeline::new(reader, writer);
//! let backtrace = pipeline.execute_command("bt", true, false).await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod codec;
mod error;
mod pipeline;
mod prompt;
mod reader;
mod settle;
mod transport;
mod writer;

pub mod testing;

pub use codec::ConsoleCodec;
pub use error::TransportError;
pub use pipeline::{PipelineEvent, PipelineEvents, RequestPipeline};
pub use prompt::is_debugger_prompt;
pub use reader::ConsoleReader;
pub use settle::{DEFAULT_SETTLE_PERIOD, settle};
pub use transport::{DeviceTransport, split};
pub use writer::CommandWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Port the device debugger console listens on.
pub const DEFAULT_DEBUG_PORT: u16 = 8085;

/// Connect to a device debugger console and return a reader/writer pair.
///
/// # Example
///
/// ```ignore
/// let (reader, writer) = transport::connect("192.168.1.20:8085").await?;
/// ```
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    ConsoleReader<tokio::net::tcp::OwnedReadHalf>,
    CommandWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    Ok(split(stream))
}
