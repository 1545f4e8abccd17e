use std::collections::BTreeMap;
use std::path::PathBuf;

use breakpoints::{Breakpoint, BreakpointManager, SourceBreakpoint};

use crate::breakpoint_arg::BreakpointArg;

/// The breakpoints asked for during a session, by file.
///
/// The manager is told about every breakpoint of a file at once, so each
/// new request is sent along with the earlier ones.
pub struct SessionBreakpoints {
    manager: BreakpointManager,
    requested: BTreeMap<PathBuf, Vec<SourceBreakpoint>>,
}

impl SessionBreakpoints {
    pub fn new(manager: BreakpointManager) -> Self {
        Self {
            manager,
            requested: BTreeMap::new(),
        }
    }

    /// Request a breakpoint and return what the manager made of it.
    pub fn add(&mut self, arg: &BreakpointArg) -> Option<Breakpoint> {
        let requested = self.requested.entry(arg.path.clone()).or_default();
        if !requested.iter().any(|b| b.line == arg.line) {
            requested.push(SourceBreakpoint::at_line(arg.line));
        }
        self.manager
            .set_breakpoints_for_file(&arg.path, requested)
            .into_iter()
            .find(|b| b.line == arg.line)
    }

    pub fn manager_mut(&mut self) -> &mut BreakpointManager {
        &mut self.manager
    }
}
