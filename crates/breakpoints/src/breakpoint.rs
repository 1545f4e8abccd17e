use std::path::PathBuf;

/// A breakpoint as requested by the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBreakpoint {
    /// 1-based
    pub line: u32,
    /// 0-based, defaults to the start of the line
    pub column: Option<u32>,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
}

impl SourceBreakpoint {
    pub fn at_line(line: u32) -> Self {
        Self {
            line,
            ..Default::default()
        }
    }
}

/// A breakpoint known to the manager, annotated with whether it will
/// actually be hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: Option<u64>,
    pub line: u32,
    pub column: u32,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
    pub verified: bool,
    /// Written into the staged files, so toggling it off and on again after
    /// launch still refers to a real `STOP`.
    pub was_added_before_launch: bool,
    pub is_entry_breakpoint: bool,
}

impl From<&SourceBreakpoint> for Breakpoint {
    fn from(requested: &SourceBreakpoint) -> Self {
        Self {
            line: requested.line,
            column: requested.column.unwrap_or(0),
            condition: requested.condition.clone(),
            hit_condition: requested.hit_condition.clone(),
            log_message: requested.log_message.clone(),
            ..Default::default()
        }
    }
}

/// How a staging location was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Through a source map next to the staged file.
    SourceMap,
    /// By re-rooting the source path into the staging folder.
    SourceDirs,
}

/// One edit to perform on a staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointWorkItem {
    pub source_file_path: PathBuf,
    pub staging_file_path: PathBuf,
    /// 1-based line in the staged file
    pub line_number: u32,
    pub column_index: u32,
    pub condition: Option<String>,
    pub hit_condition: Option<String>,
    pub log_message: Option<String>,
    pub kind: LocationKind,
}

/// The folders a launch works with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub root_dir: PathBuf,
    pub source_dirs: Vec<PathBuf>,
    pub staging_folder_path: PathBuf,
}

impl Project {
    /// Folders whose files may have been copied into staging, in lookup
    /// order.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        std::iter::once(self.root_dir.clone())
            .chain(self.source_dirs.iter().cloned())
            .collect()
    }
}
