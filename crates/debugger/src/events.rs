use tokio::sync::mpsc;

use crate::diagnostics::CompileError;
use crate::runtime::RuntimeError;

/// Notifications published by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// The channel is running and the adapter has been activated.
    Start,
    /// Execution stopped at the debugger prompt.
    Suspend { thread_id: Option<u32> },
    CompileErrors(Vec<CompileError>),
    RuntimeError(RuntimeError),
    CannotContinue,
    /// Every chunk from the device, plus echoed commands.
    ConsoleOutput(String),
    /// Output nobody was waiting for.
    UnhandledConsoleOutput(String),
    /// The connection is gone. Always the last event.
    Close,
}

/// Async event receiver that wraps tokio mpsc
pub struct AdapterEventReceiver {
    rx: mpsc::UnboundedReceiver<AdapterEvent>,
}

impl AdapterEventReceiver {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<AdapterEvent>) -> Self {
        Self { rx }
    }

    /// Receive next event asynchronously
    pub async fn recv(&mut self) -> Option<AdapterEvent> {
        self.rx.recv().await
    }

    /// Convert to a Stream for use with StreamExt
    pub fn into_stream(self) -> impl futures::Stream<Item = AdapterEvent> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}
