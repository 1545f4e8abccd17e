use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use transport::{DeviceTransport, PipelineEvent, PipelineEvents, RequestPipeline};

use crate::cache::{Cached, QueryCache, QueryKey};
use crate::device::{DeviceControl, EcpDeviceControl};
use crate::error::AdapterError;
use crate::events::{AdapterEvent, AdapterEventReceiver};
use crate::parse::{self, EvaluateContainer, HighLevelType, StackFrame, Thread};
use crate::patterns::{
    ends_at_prompt, is_app_running_marker, is_break_line, is_cannot_continue,
    is_micro_debugger_start, split_lines,
};
use crate::runtime::RuntimeError;
use crate::status::{AdapterStatus, CompileTracker, TimerAction};

const STRING_WRAP: &str = "--string-wrap--";

/// How many times `exit` is sent when tearing down, to leave nested
/// debugger sessions.
const EXIT_ATTEMPTS: usize = 10;

/// Tunables for [`RokuAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub port: u16,
    /// Resume automatically from breaks reported inside the micro debugger.
    pub enable_debugger_auto_recovery: bool,
    /// Quiet period used to drain stale output after connecting.
    pub settle_period: Duration,
    /// How long to wait for more compile output before reporting errors.
    pub compile_error_debounce: Duration,
    pub device_control: Arc<dyn DeviceControl>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            port: transport::DEFAULT_DEBUG_PORT,
            enable_debugger_auto_recovery: false,
            settle_period: transport::DEFAULT_SETTLE_PERIOD,
            compile_error_debounce: Duration::from_millis(1000),
            device_control: Arc::new(EcpDeviceControl::default()),
        }
    }
}

#[derive(Default)]
struct AdapterState {
    tracker: CompileTracker,
    is_activated: bool,
    is_app_running: bool,
    is_at_debugger_prompt: bool,
    is_in_micro_debugger: bool,
    is_next_breakpoint_skipped: bool,
    has_started: bool,
    cache: QueryCache,
    events: Option<mpsc::UnboundedSender<AdapterEvent>>,
}

impl AdapterState {
    fn emit(&self, event: AdapterEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if events.send(event).is_err() {
            tracing::trace!("no adapter event listener");
        }
    }

    /// Emit `Start` the first time the adapter is both activated and sees the
    /// channel running. Returns true when the caller should look up the
    /// stopped thread.
    fn begin_startup(&mut self) -> bool {
        if !self.is_activated || !self.is_app_running || self.has_started {
            return false;
        }
        self.has_started = true;
        tracing::debug!("channel started");
        self.emit(AdapterEvent::Start);
        self.is_at_debugger_prompt
    }

    fn track_micro_debugger(&mut self, text: &str, auto_recovery: bool) {
        for line in split_lines(text) {
            if is_micro_debugger_start(line) {
                self.is_in_micro_debugger = true;
                self.is_next_breakpoint_skipped = false;
            } else if self.is_in_micro_debugger && ends_at_prompt(line) {
                self.is_in_micro_debugger = false;
            } else if self.is_in_micro_debugger && auto_recovery && is_break_line(line) {
                tracing::debug!("break inside the micro debugger will be skipped");
                self.is_next_breakpoint_skipped = true;
            }
        }
    }
}

enum Lookup<T> {
    Hit(T),
    /// Not cached; a reply may be stored under `generation`.
    Miss { generation: u64 },
}

/// What the processor still has to do after releasing the state lock.
#[derive(Default)]
struct FollowUp {
    timer: Option<TimerAction>,
    resume: bool,
    suspend_with_thread: bool,
}

struct AdapterInternals {
    pipeline: RequestPipeline,
    state: Mutex<AdapterState>,
    options: AdapterOptions,
}

impl AdapterInternals {
    async fn on_console_output(&self, text: String) {
        let mut state = self.state.lock().await;
        state.track_micro_debugger(&text, self.options.enable_debugger_auto_recovery);
        if !text.is_empty() {
            state.emit(AdapterEvent::ConsoleOutput(text));
        }
    }

    async fn on_unhandled_output(&self, text: String) -> FollowUp {
        let mut state = self.state.lock().await;

        if let Some(error) = RuntimeError::find(&text) {
            tracing::debug!(?error, "runtime error");
            state.is_at_debugger_prompt = true;
            state.emit(AdapterEvent::RuntimeError(error));
            return FollowUp::default();
        }

        if !text.is_empty() {
            state.emit(AdapterEvent::UnhandledConsoleOutput(text.clone()));
        }

        let mut follow_up = FollowUp {
            timer: Some(state.tracker.process(&text)),
            ..Default::default()
        };

        if is_cannot_continue(&text) {
            state.is_at_debugger_prompt = true;
            state.emit(AdapterEvent::CannotContinue);
            return follow_up;
        }

        if is_app_running_marker(&text) {
            state.is_app_running = true;
        }

        if ends_at_prompt(&text) {
            if state.is_next_breakpoint_skipped {
                state.is_in_micro_debugger = false;
                state.is_next_breakpoint_skipped = false;
                follow_up.resume = true;
            } else if !state.is_at_debugger_prompt {
                state.is_at_debugger_prompt = true;
                if state.is_activated && state.has_started {
                    state.emit(AdapterEvent::Suspend { thread_id: None });
                }
            }
        } else {
            state.is_at_debugger_prompt = false;
        }

        follow_up.suspend_with_thread = state.begin_startup();
        follow_up
    }

    async fn report_compile_errors(&self) {
        let mut state = self.state.lock().await;
        let errors = state.tracker.finalize();
        if errors.is_empty() {
            tracing::debug!("compile output finished without reportable errors");
            return;
        }
        tracing::debug!(count = errors.len(), "reporting compile errors");
        state.emit(AdapterEvent::CompileErrors(errors));
    }

    /// Query the threads and report the stop on the first of them.
    async fn suspend_with_thread(&self) {
        match self.get_threads().await {
            Ok(threads) => {
                let thread_id = threads.first().map(|thread| thread.thread_id);
                self.state
                    .lock()
                    .await
                    .emit(AdapterEvent::Suspend { thread_id });
            }
            Err(e) => tracing::warn!(error = %e, "looking up the stopped thread"),
        }
    }

    /// Every command that moves execution goes through here.
    async fn execute_state_changing(
        &self,
        command: &str,
        wait_for_prompt: bool,
    ) -> eyre::Result<Option<String>> {
        {
            let mut state = self.state.lock().await;
            state.cache.clear();
            state.is_at_debugger_prompt = false;
        }
        self.pipeline
            .execute_command(command, wait_for_prompt, false)
            .await
            .wrap_err_with(|| format!("executing {command:?}"))
    }

    async fn ensure_paused(&self, operation: &'static str) -> eyre::Result<()> {
        if self.state.lock().await.is_at_debugger_prompt {
            Ok(())
        } else {
            Err(AdapterError::NotPaused { operation }.into())
        }
    }

    async fn cached<T: Cached>(&self, key: &QueryKey) -> Lookup<T> {
        let state = self.state.lock().await;
        match state.cache.get(key) {
            Some(value) => Lookup::Hit(value),
            None => Lookup::Miss {
                generation: state.cache.generation(),
            },
        }
    }

    async fn remember<T: Cached + Clone>(&self, key: QueryKey, generation: u64, value: &T) {
        self.state
            .lock()
            .await
            .cache
            .insert(key, generation, value.clone());
    }

    async fn query(&self, command: String) -> eyre::Result<String> {
        let output = self
            .pipeline
            .execute_command(command.as_str(), true, false)
            .await
            .wrap_err_with(|| format!("executing {command:?}"))?;
        Ok(output.unwrap_or_default())
    }

    async fn get_threads(&self) -> eyre::Result<Vec<Thread>> {
        self.ensure_paused("get threads").await?;
        let generation = match self.cached(&QueryKey::Threads).await {
            Lookup::Hit(threads) => return Ok(threads),
            Lookup::Miss { generation } => generation,
        };
        let threads = parse::parse_threads(&self.query("threads".into()).await?);
        self.remember(QueryKey::Threads, generation, &threads).await;
        Ok(threads)
    }

    async fn get_variable_type(&self, expression: &str) -> eyre::Result<Option<String>> {
        self.ensure_paused("get variable type").await?;
        let key = QueryKey::VariableType(expression.to_string());
        let generation = match self.cached(&key).await {
            Lookup::Hit(variable_type) => return Ok(Some(variable_type)),
            Lookup::Miss { generation } => generation,
        };
        let output = self.query(format!("print Type({expression})")).await?;
        let Some(variable_type) = parse::expression_details(&output).map(|t| t.trim().to_string())
        else {
            return Ok(None);
        };
        self.remember(key, generation, &variable_type).await;
        Ok(Some(variable_type))
    }
}

/// Adapter for the debugger console of one device.
///
/// Dropping the adapter stops the output processor and the pipeline.
pub struct RokuAdapter {
    internals: Arc<AdapterInternals>,
    event_rx: AdapterEventReceiver,
    cancel_token: CancellationToken,
    processor_handle: Option<JoinHandle<()>>,
}

impl RokuAdapter {
    /// Send the device home, then connect to its debugger console.
    ///
    /// Call this before the channel is launched so that its compile output is
    /// observed.
    #[tracing::instrument(skip(options))]
    pub async fn connect(host: &str, options: AdapterOptions) -> eyre::Result<Self> {
        options
            .device_control
            .press_home_button(host)
            .await
            .wrap_err("returning the device to the home screen")?;

        let stream = TcpStream::connect((host, options.port))
            .await
            .wrap_err_with(|| format!("connecting to {host}:{}", options.port))?;

        Self::from_transport(stream, options).await
    }

    /// Create from an existing transport (useful for testing)
    pub async fn from_transport<T: DeviceTransport>(
        transport: T,
        options: AdapterOptions,
    ) -> eyre::Result<Self> {
        let (mut reader, writer) = transport::split(transport);
        let drained = transport::settle(&mut reader, options.settle_period)
            .await
            .wrap_err("waiting for the console to settle")?;
        tracing::debug!(drained, "console settled");

        let (pipeline, pipeline_events) = RequestPipeline::new(reader, writer);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let internals = Arc::new(AdapterInternals {
            pipeline,
            state: Mutex::new(AdapterState {
                events: Some(event_tx),
                ..Default::default()
            }),
            options,
        });

        let processor_handle = Self::spawn_processor_task(
            pipeline_events,
            Arc::clone(&internals),
            cancel_token.clone(),
        );

        Ok(Self {
            internals,
            event_rx: AdapterEventReceiver::new(event_rx),
            cancel_token,
            processor_handle: Some(processor_handle),
        })
    }

    fn spawn_processor_task(
        mut pipeline_events: PipelineEvents,
        internals: Arc<AdapterInternals>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let debounce = internals.options.compile_error_debounce;
            let mut deadline: Option<Instant> = None;

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        tracing::debug!("processor task cancelled");
                        break;
                    }
                    _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                        deadline = None;
                        internals.report_compile_errors().await;
                    }
                    event = pipeline_events.recv() => match event {
                        Some(PipelineEvent::ConsoleOutput(text)) => {
                            internals.on_console_output(text).await;
                        }
                        Some(PipelineEvent::UnhandledConsoleOutput(text)) => {
                            let follow_up = internals.on_unhandled_output(text).await;
                            match follow_up.timer {
                                Some(TimerAction::Restart) => deadline = Some(Instant::now() + debounce),
                                Some(TimerAction::Cancel) => deadline = None,
                                Some(TimerAction::Keep) | None => {}
                            }
                            if follow_up.resume {
                                let internals = Arc::clone(&internals);
                                tokio::spawn(async move {
                                    if let Err(e) = internals.execute_state_changing("c", false).await {
                                        tracing::warn!(error = %e, "resuming from a skipped break");
                                    }
                                });
                            }
                            if follow_up.suspend_with_thread {
                                let internals = Arc::clone(&internals);
                                tokio::spawn(async move { internals.suspend_with_thread().await });
                            }
                        }
                        Some(PipelineEvent::Closed) | None => {
                            tracing::debug!("device connection closed");
                            internals.state.lock().await.emit(AdapterEvent::Close);
                            break;
                        }
                    },
                }
            }
        })
    }

    /// Get event receiver for subscribing to adapter events
    pub fn events(&mut self) -> &mut AdapterEventReceiver {
        &mut self.event_rx
    }

    /// Start reporting `Start` and `Suspend` events.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self) {
        let suspend_with_thread = {
            let mut state = self.internals.state.lock().await;
            state.is_activated = true;
            state.begin_startup()
        };
        if suspend_with_thread {
            self.internals.suspend_with_thread().await;
        }
    }

    pub async fn status(&self) -> AdapterStatus {
        self.internals.state.lock().await.tracker.status()
    }

    pub async fn is_at_debugger_prompt(&self) -> bool {
        self.internals.state.lock().await.is_at_debugger_prompt
    }

    pub async fn is_app_running(&self) -> bool {
        self.internals.state.lock().await.is_app_running
    }

    pub async fn is_activated(&self) -> bool {
        self.internals.state.lock().await.is_activated
    }

    pub async fn step_over(&self) -> eyre::Result<()> {
        self.internals.execute_state_changing("over", false).await?;
        Ok(())
    }

    pub async fn step_into(&self) -> eyre::Result<()> {
        self.internals.execute_state_changing("step", false).await?;
        Ok(())
    }

    pub async fn step_out(&self) -> eyre::Result<()> {
        self.internals.execute_state_changing("out", false).await?;
        Ok(())
    }

    pub async fn continue_execution(&self) -> eyre::Result<()> {
        self.internals.execute_state_changing("c", false).await?;
        Ok(())
    }

    /// Break into the debugger. Does nothing if already stopped.
    pub async fn pause(&self) -> eyre::Result<()> {
        if self.is_at_debugger_prompt().await {
            return Ok(());
        }
        self.internals.execute_state_changing("\x03;", false).await?;
        Ok(())
    }

    /// Run `command` at the debugger prompt and return its output.
    #[tracing::instrument(skip(self))]
    pub async fn evaluate(&self, command: &str) -> eyre::Result<String> {
        self.internals.ensure_paused("evaluate").await?;
        let output = self
            .internals
            .execute_state_changing(command, true)
            .await?
            .unwrap_or_default();
        // a reply means the prompt is back
        self.internals.state.lock().await.is_at_debugger_prompt = true;
        Ok(output)
    }

    /// Threads of the stopped channel, the selected one first.
    #[tracing::instrument(skip(self))]
    pub async fn get_threads(&self) -> eyre::Result<Vec<Thread>> {
        self.internals.get_threads().await
    }

    /// Frames of the selected thread, innermost first.
    #[tracing::instrument(skip(self))]
    pub async fn get_stack_trace(&self) -> eyre::Result<Vec<StackFrame>> {
        let internals = &self.internals;
        internals.ensure_paused("get stack trace").await?;
        let generation = match internals.cached(&QueryKey::StackTrace).await {
            Lookup::Hit(frames) => return Ok(frames),
            Lookup::Miss { generation } => generation,
        };
        let frames = parse::parse_stack_trace(&internals.query("bt".into()).await?);
        internals
            .remember(QueryKey::StackTrace, generation, &frames)
            .await;
        Ok(frames)
    }

    /// Names of the variables in the current scope.
    #[tracing::instrument(skip(self))]
    pub async fn get_scope_variables(&self) -> eyre::Result<Vec<String>> {
        let internals = &self.internals;
        internals.ensure_paused("get scope variables").await?;
        let generation = match internals.cached(&QueryKey::ScopeVariables).await {
            Lookup::Hit(names) => return Ok(names),
            Lookup::Miss { generation } => generation,
        };
        let names = parse::parse_scope_variables(&internals.query("var".into()).await?);
        internals
            .remember(QueryKey::ScopeVariables, generation, &names)
            .await;
        Ok(names)
    }

    /// The result of `Type(expression)` on the device.
    #[tracing::instrument(skip(self))]
    pub async fn get_variable_type(&self, expression: &str) -> eyre::Result<Option<String>> {
        self.internals.get_variable_type(expression).await
    }

    /// Evaluate `expression` on the device, with one level of children for
    /// arrays and objects.
    #[tracing::instrument(skip(self))]
    pub async fn get_variable(&self, expression: &str) -> eyre::Result<EvaluateContainer> {
        let internals = &self.internals;
        internals.ensure_paused("get variable").await?;
        let key = QueryKey::Variable(expression.to_string());
        let generation = match internals.cached(&key).await {
            Lookup::Hit(container) => return Ok(container),
            Lookup::Miss { generation } => generation,
        };

        let variable_type = internals.get_variable_type(expression).await?;
        let is_string = variable_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("string") || t.eq_ignore_ascii_case("rostring"));

        let command = if is_string {
            format!("print \"{STRING_WRAP}\" + {expression} + \"{STRING_WRAP}\"")
        } else {
            format!("print {expression}")
        };
        let output = internals.query(command).await?;
        let details = parse::expression_details(&output).ok_or_else(|| {
            AdapterError::MalformedOutput {
                what: "print",
                data: output.clone(),
            }
        })?;

        let value = if is_string {
            let inner = details.trim().replace(STRING_WRAP, "").replace('"', "\\\"");
            format!("\"{inner}\"")
        } else {
            details.trim().to_string()
        };

        let high_level_type = parse::high_level_type(variable_type.as_deref())?;
        let children = match high_level_type {
            HighLevelType::Array => parse::array_children(expression, &value)?,
            HighLevelType::Object => parse::object_children(expression, &value)?,
            _ => Vec::new(),
        };

        let container = EvaluateContainer {
            name: expression.to_string(),
            evaluate_name: expression.to_string(),
            variable_type: variable_type.unwrap_or_default(),
            value,
            high_level_type,
            children,
        };
        internals.remember(key, generation, &container).await;
        Ok(container)
    }

    /// Leave any active debugger session and disconnect.
    #[tracing::instrument(skip(self))]
    pub async fn destroy(&self) {
        for _ in 0..EXIT_ATTEMPTS {
            if let Err(e) = self.internals.pipeline.execute_command("exit", false, false).await {
                tracing::debug!(error = %e, "sending exit");
                break;
            }
        }
        self.internals.pipeline.destroy();
        self.internals.state.lock().await.events = None;
        self.cancel_token.cancel();
    }

    /// Returns true once the output processor has stopped.
    pub fn is_finished(&self) -> bool {
        self.processor_handle
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

impl Drop for RokuAdapter {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
