//! Error types for the transport layer.

use std::io;

/// Errors that can occur while talking to the device console.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device closed the connection.
    #[error("connection closed by device")]
    Closed,

    /// The request pipeline was destroyed before the command completed.
    #[error("request pipeline shut down")]
    PipelineShutDown,
}
