use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream};

use super::memory::MemoryTransport;
use super::reply;
use crate::reader::ConsoleReader;
use crate::transport::DeviceTransport;

/// The device end of a [`MemoryTransport`].
///
/// # Example
///
/// ```ignore
/// use transport::testing::{DeviceConsole, MemoryTransport};
///
/// let (client, device) = MemoryTransport::pair();
/// let mut device = DeviceConsole::new(device);
///
/// device.respond("print Type(m)", "roAssociativeArray").await;
/// ```
pub struct DeviceConsole {
    reader: ConsoleReader<DuplexStream>,
    writer: DuplexStream,
    pending: String,
}

impl DeviceConsole {
    pub fn new(transport: MemoryTransport) -> Self {
        let (read, write) = transport.into_split();
        Self {
            reader: ConsoleReader::new(read),
            writer: write,
            pending: String::new(),
        }
    }

    /// Write raw console output to the client.
    pub async fn send(&mut self, text: &str) {
        self.writer
            .write_all(text.as_bytes())
            .await
            .expect("writing to client");
        self.writer.flush().await.expect("flushing to client");
    }

    /// Read the next command line, or `None` once the client hung up.
    pub async fn next_command(&mut self) -> Option<String> {
        loop {
            if let Some(idx) = self.pending.find("\r\n") {
                let command = self.pending[..idx].to_string();
                self.pending.drain(..idx + 2);
                return Some(command);
            }

            match self.reader.next().await {
                Some(Ok(chunk)) => self.pending.push_str(&chunk),
                Some(Err(_)) | None => return None,
            }
        }
    }

    /// Like [`DeviceConsole::next_command`], but gives up after `within`.
    pub async fn try_next_command(&mut self, within: Duration) -> Option<String> {
        tokio::time::timeout(within, self.next_command())
            .await
            .ok()
            .flatten()
    }

    /// Read the next command and assert that it is `expected`.
    pub async fn expect_command(&mut self, expected: &str) {
        let command = self
            .try_next_command(Duration::from_secs(5))
            .await
            .unwrap_or_else(|| panic!("timed out waiting for command {expected:?}"));
        assert_eq!(command, expected, "unexpected command from client");
    }

    /// Expect `command`, then answer it with `body` followed by the prompt.
    pub async fn respond(&mut self, command: &str, body: &str) {
        self.expect_command(command).await;
        self.send(&reply(body)).await;
    }
}
