//! Command pipeline over the device console.
//!
//! The device never tags its replies, so the only way to attribute output to
//! a command is to have at most one command waiting for the prompt at any
//! time. [`RequestPipeline`] is a handle to an actor task that owns the
//! connection, queues commands in submission order and hands each awaited
//! command the text that arrived between writing it and the prompt coming
//! back. Output that arrives while nothing is waiting is reported as
//! [`PipelineEvent::UnhandledConsoleOutput`].

use std::collections::VecDeque;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::prompt::is_debugger_prompt;
use crate::reader::ConsoleReader;
use crate::writer::CommandWriter;

/// Notifications published by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Every chunk received from the device, plus echoed commands.
    ConsoleOutput(String),
    /// Output received while no command was waiting for the prompt.
    UnhandledConsoleOutput(String),
    /// The device closed the connection. Always the last event.
    Closed,
}

/// Receiver for [`PipelineEvent`]s, owned by whoever created the pipeline.
pub struct PipelineEvents {
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl PipelineEvents {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Convert to a Stream for use with StreamExt
    pub fn into_stream(self) -> impl futures::Stream<Item = PipelineEvent> {
        tokio_stream::wrappers::UnboundedReceiverStream::new(self.rx)
    }
}

enum Request {
    Awaited {
        command: String,
        silent: bool,
        reply: oneshot::Sender<Result<String, TransportError>>,
    },
    FireAndForget {
        command: String,
        silent: bool,
        sent: oneshot::Sender<Result<(), TransportError>>,
    },
}

impl Request {
    fn fail(self, error: TransportError) {
        match self {
            Request::Awaited { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Request::FireAndForget { sent, .. } => {
                let _ = sent.send(Err(error));
            }
        }
    }
}

/// Handle to the command pipeline actor.
///
/// Dropping the handle (or calling [`RequestPipeline::destroy`]) stops the
/// actor and closes the connection.
pub struct RequestPipeline {
    sender: mpsc::UnboundedSender<Request>,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl RequestPipeline {
    /// Start a pipeline over an already settled connection.
    pub fn new<R, W>(reader: ConsoleReader<R>, writer: CommandWriter<W>) -> (Self, PipelineEvents)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, requests) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let actor = PipelineActor {
            reader,
            writer,
            queue: VecDeque::new(),
            current: None,
            accumulated: String::new(),
            events: event_tx,
        };
        let task = tokio::spawn(actor.run(requests, cancel_token.clone()));

        (
            Self {
                sender,
                cancel_token,
                task,
            },
            PipelineEvents { rx: event_rx },
        )
    }

    /// Queue a command for execution.
    ///
    /// With `wait_for_prompt` the future resolves with everything the device
    /// printed until its prompt reappeared. There is no timeout: a device that
    /// never prints the prompt again stalls the queue. Without
    /// `wait_for_prompt` the future resolves with `None` as soon as the command
    /// has been written, and its output is reported through [`PipelineEvents`].
    ///
    /// `silent` suppresses the echo of the command as console output.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn execute_command(
        &self,
        command: impl Into<String> + std::fmt::Debug,
        wait_for_prompt: bool,
        silent: bool,
    ) -> Result<Option<String>, TransportError> {
        let command = command.into();
        if wait_for_prompt {
            let (reply, response) = oneshot::channel();
            self.submit(Request::Awaited {
                command,
                silent,
                reply,
            })?;
            let output = response
                .await
                .map_err(|_| TransportError::PipelineShutDown)??;
            tracing::debug!(bytes = output.len(), "command finished after prompt");
            Ok(Some(output))
        } else {
            let (sent, written) = oneshot::channel();
            self.submit(Request::FireAndForget {
                command,
                silent,
                sent,
            })?;
            written
                .await
                .map_err(|_| TransportError::PipelineShutDown)??;
            Ok(None)
        }
    }

    /// Stop the actor and close the connection.
    ///
    /// Queued commands fail with [`TransportError::PipelineShutDown`] and no
    /// further events are published.
    pub fn destroy(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::debug!("destroying request pipeline");
        }
        self.cancel_token.cancel();
    }

    /// Returns true once the actor has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn submit(&self, request: Request) -> Result<(), TransportError> {
        self.sender
            .send(request)
            .map_err(|_| TransportError::PipelineShutDown)
    }
}

impl Drop for RequestPipeline {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct PipelineActor<R, W> {
    reader: ConsoleReader<R>,
    writer: CommandWriter<W>,
    queue: VecDeque<Request>,
    current: Option<oneshot::Sender<Result<String, TransportError>>>,
    accumulated: String,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl<R, W> PipelineActor<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    tracing::debug!("request pipeline cancelled");
                    self.shut_down(|| TransportError::PipelineShutDown);
                    break;
                }
                request = requests.recv() => {
                    let Some(request) = request else {
                        tracing::debug!("all pipeline handles dropped");
                        break;
                    };
                    self.queue.push_back(request);
                    if let Err(e) = self.process_queue().await {
                        tracing::warn!(error = %e, "writing to device failed");
                        self.close();
                        break;
                    }
                }
                chunk = self.reader.next() => match chunk {
                    Some(Ok(text)) => {
                        if let Err(e) = self.on_data(text).await {
                            tracing::warn!(error = %e, "writing to device failed");
                            self.close();
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "reading from device failed");
                        self.close();
                        break;
                    }
                    None => {
                        tracing::debug!("device closed the connection");
                        self.close();
                        break;
                    }
                },
            }
        }
    }

    async fn on_data(&mut self, text: String) -> Result<(), TransportError> {
        tracing::trace!(chunk = ?text, "received console output");
        self.emit(PipelineEvent::ConsoleOutput(text.clone()));
        self.accumulated.push_str(&text);

        let Some(reply) = self.current.take() else {
            let output = std::mem::take(&mut self.accumulated);
            self.emit(PipelineEvent::UnhandledConsoleOutput(output));
            return Ok(());
        };

        // the prompt may have been split across reads, so check the whole reply
        if is_debugger_prompt(&self.accumulated) {
            let output = std::mem::take(&mut self.accumulated);
            let _ = reply.send(Ok(output));
            self.process_queue().await
        } else {
            self.current = Some(reply);
            Ok(())
        }
    }

    /// Write queued commands until one of them has to wait for the prompt.
    async fn process_queue(&mut self) -> Result<(), TransportError> {
        while self.current.is_none() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };

            match request {
                Request::Awaited {
                    command,
                    silent,
                    reply,
                } => {
                    if let Err(e) = self.write(&command, silent).await {
                        let _ = reply.send(Err(e));
                        return Err(TransportError::Closed);
                    }
                    self.current = Some(reply);
                }
                Request::FireAndForget {
                    command,
                    silent,
                    sent,
                } => {
                    if let Err(e) = self.write(&command, silent).await {
                        let _ = sent.send(Err(e));
                        return Err(TransportError::Closed);
                    }
                    let _ = sent.send(Ok(()));
                }
            }
        }
        Ok(())
    }

    async fn write(&mut self, command: &str, silent: bool) -> Result<(), TransportError> {
        tracing::debug!(%command, "sending command");
        if !silent {
            self.emit(PipelineEvent::ConsoleOutput(command.to_string()));
        }
        self.writer.send(command).await
    }

    fn emit(&self, event: PipelineEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("no pipeline event listener");
        }
    }

    fn shut_down(&mut self, error: fn() -> TransportError) {
        if let Some(reply) = self.current.take() {
            let _ = reply.send(Err(error()));
        }
        for request in self.queue.drain(..) {
            request.fail(error());
        }
    }

    fn close(&mut self) {
        self.shut_down(|| TransportError::Closed);
        self.emit(PipelineEvent::Closed);
    }
}
