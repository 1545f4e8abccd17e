use crate::diagnostics::{self, CompileError};
use crate::patterns::{is_compiling_banner, is_running_banner, split_lines};

/// Where the channel is in its life cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdapterStatus {
    #[default]
    None,
    Compiling,
    CompileError,
    Running,
}

/// Something in the console output that can move the status on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    CompilingBanner,
    Diagnostics,
    RunningBanner,
}

impl AdapterStatus {
    /// The transition table. `None` means the trigger is ignored in this
    /// status.
    pub fn on(self, trigger: Trigger) -> Option<AdapterStatus> {
        use AdapterStatus as S;
        use Trigger as T;

        match (self, trigger) {
            (S::None, T::CompilingBanner) => Some(S::Compiling),
            (S::Compiling, T::Diagnostics) => Some(S::CompileError),
            (S::Compiling | S::CompileError, T::RunningBanner) => Some(S::Running),
            _ => None,
        }
    }
}

/// What to do with the compile error debounce timer after a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Keep,
    Restart,
    Cancel,
}

/// Follows the compile phase and collects the text it produces.
#[derive(Debug, Default)]
pub struct CompileTracker {
    status: AdapterStatus,
    compiling_lines: Vec<String>,
}

impl CompileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AdapterStatus {
        self.status
    }

    /// Feed a chunk of unhandled console output.
    pub fn process(&mut self, text: &str) -> TimerAction {
        let mut lines = split_lines(text);

        if self.status == AdapterStatus::None {
            // anything before the last banner belongs to an earlier run
            let Some(start) = lines.iter().rposition(|line| is_compiling_banner(line)) else {
                return TimerAction::Keep;
            };
            lines.drain(..=start);
            self.fire(Trigger::CompilingBanner);
        }

        match self.status {
            AdapterStatus::Compiling | AdapterStatus::CompileError => {
                if lines.iter().any(|line| is_running_banner(line)) {
                    self.fire(Trigger::RunningBanner);
                    return TimerAction::Cancel;
                }

                self.compiling_lines
                    .extend(lines.into_iter().map(str::to_string));
                if self.status == AdapterStatus::Compiling
                    && !diagnostics::extract_all(&self.compiling_lines).is_empty()
                {
                    self.fire(Trigger::Diagnostics);
                }

                if self.status == AdapterStatus::CompileError {
                    TimerAction::Restart
                } else {
                    TimerAction::Keep
                }
            }
            AdapterStatus::None | AdapterStatus::Running => TimerAction::Keep,
        }
    }

    /// The debounce expired: everything has arrived, report it.
    pub fn finalize(&mut self) -> Vec<CompileError> {
        self.status = AdapterStatus::CompileError;
        diagnostics::reportable(diagnostics::extract_all(&self.compiling_lines))
    }

    fn fire(&mut self, trigger: Trigger) {
        if let Some(next) = self.status.on(trigger) {
            tracing::debug!(from = ?self.status, to = ?next, ?trigger, "status change");
            self.status = next;
        }
    }
}
