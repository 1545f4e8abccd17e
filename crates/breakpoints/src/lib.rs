//! Breakpoint instrumentation for staged BrightScript projects.
//!
//! The device cannot set breakpoints at runtime, so breakpoints requested
//! before launch are written into the staged copy of the project as `STOP`
//! (or conditional, counting, or `PRINT`) statements. A source map is written
//! next to every rewritten file so that device positions can be translated
//! back to the files the user edited.
//!
//! ```ignore
//! let mut manager = BreakpointManager::new(
//!     Box::new(StagingFileResolver::default()),
//!     BreakpointOptions::default(),
//! );
//! manager.set_breakpoints_for_file("/project/source/main.brs", &[SourceBreakpoint::at_line(3)]);
//! manager.write_breakpoints_for_project(&project).await?;
//! manager.lock_breakpoints(&project);
//! ```

mod breakpoint;
pub mod files;
mod manager;
pub mod manifest;
pub mod sourcemap;
mod statements;

pub use breakpoint::{Breakpoint, BreakpointWorkItem, LocationKind, Project, SourceBreakpoint};
pub use files::{
    EntryPoint, FileResolver, SourceLocation, StagingFileResolver, StagingLocation,
    StagingLocations, source_location_for,
};
pub use manager::{BreakpointManager, BreakpointOptions, SUPPORTED_EXTENSIONS};
pub use statements::HIT_COUNTER_OBJECT;
