use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncRead;

use crate::error::TransportError;
use crate::reader::ConsoleReader;

/// Quiet period used when connecting to a device.
pub const DEFAULT_SETTLE_PERIOD: Duration = Duration::from_millis(400);

/// Wait until the connection has been quiet for `quiet`, discarding anything
/// that arrives in the meantime.
///
/// A freshly opened console can still be replaying output from a previous
/// session. Returns the number of bytes thrown away.
#[tracing::instrument(skip(reader))]
pub async fn settle<R>(reader: &mut ConsoleReader<R>, quiet: Duration) -> Result<usize, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut discarded = 0;
    loop {
        match tokio::time::timeout(quiet, reader.next()).await {
            Err(_elapsed) => {
                tracing::debug!(discarded, "console settled");
                return Ok(discarded);
            }
            Ok(Some(Ok(chunk))) => {
                tracing::trace!(?chunk, "discarding stale output");
                discarded += chunk.len();
            }
            Ok(Some(Err(e))) => return Err(e),
            Ok(None) => return Err(TransportError::Closed),
        }
    }
}
