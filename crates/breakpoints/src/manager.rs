use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use eyre::WrapErr;

use crate::files::{
    FileResolver, has_any_extension, map_path_for, paths_equal, standardize_path,
    strip_prefix_ignore_case,
};
use crate::sourcemap::{self, SourceMap, SourceMapBuilder};
use crate::statements::{HitCounters, breakpoint_lines};
use crate::{Breakpoint, BreakpointWorkItem, LocationKind, Project, SourceBreakpoint};

/// Files that can hold breakpoints.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".brs", ".bs", ".xml"];

#[derive(Debug, Clone)]
pub struct BreakpointOptions {
    /// Write a source map next to every instrumented file.
    pub enable_source_maps: bool,
}

impl Default for BreakpointOptions {
    fn default() -> Self {
        Self {
            enable_source_maps: true,
        }
    }
}

/// Where breakpoints set after launch should be looked up.
#[derive(Debug, Clone)]
struct Locked {
    root_dir: PathBuf,
    source_dirs: Vec<PathBuf>,
}

/// Keeps track of the breakpoints for a session and writes them into the
/// staged project.
pub struct BreakpointManager {
    resolver: Box<dyn FileResolver>,
    options: BreakpointOptions,
    breakpoints_by_file_path: BTreeMap<PathBuf, Vec<Breakpoint>>,
    locked: Option<Locked>,
    breakpoint_id_counter: u64,
    hit_counters: HitCounters,
}

impl std::fmt::Debug for BreakpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointManager")
            .field("options", &self.options)
            .field("breakpoints_by_file_path", &self.breakpoints_by_file_path)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl BreakpointManager {
    pub fn new(resolver: Box<dyn FileResolver>, options: BreakpointOptions) -> Self {
        Self {
            resolver,
            options,
            breakpoints_by_file_path: BTreeMap::new(),
            locked: None,
            breakpoint_id_counter: 0,
            hit_counters: HitCounters::default(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Replace the breakpoints of a file.
    ///
    /// Before launch every breakpoint in a BrightScript file is accepted.
    /// Once locked the stored breakpoints no longer change, and only lines
    /// that already had a breakpoint at launch are reported as verified.
    pub fn set_breakpoints_for_file(
        &mut self,
        path: impl AsRef<Path>,
        requested: &[SourceBreakpoint],
    ) -> Vec<Breakpoint> {
        let mut path = standardize_path(path);
        let mut breakpoints: Vec<Breakpoint> = requested.iter().map(Breakpoint::from).collect();

        if !has_any_extension(&path, SUPPORTED_EXTENSIONS) {
            tracing::debug!(path = %path.display(), "refusing breakpoints in unsupported file");
            return breakpoints;
        }

        let Some(locked) = self.locked.clone() else {
            for breakpoint in &mut breakpoints {
                breakpoint.id = Some(self.next_id());
                breakpoint.verified = true;
                breakpoint.was_added_before_launch = true;
            }
            self.breakpoints_by_file_path
                .retain(|existing, _| !paths_equal(existing, &path));
            self.breakpoints_by_file_path
                .insert(path, breakpoints.clone());
            return breakpoints;
        };

        if !locked.source_dirs.is_empty() {
            path = remap_into_source_dirs(&path, &locked);
        }
        let existing = self.get_breakpoints_for_file(&path);
        for breakpoint in &mut breakpoints {
            let known = existing
                .iter()
                .any(|e| e.was_added_before_launch && e.line == breakpoint.line);
            breakpoint.verified = known;
            breakpoint.was_added_before_launch = known;
        }
        breakpoints
    }

    /// Stop accepting new breakpoints, typically because the app has been
    /// launched.
    pub fn lock_breakpoints(&mut self, project: &Project) {
        tracing::debug!("locking breakpoints");
        self.locked = Some(Locked {
            root_dir: standardize_path(&project.root_dir),
            source_dirs: project.source_dirs.iter().map(standardize_path).collect(),
        });
    }

    /// The breakpoints stored for `path`, matched without regard to case.
    /// An empty list is created when there are none.
    pub fn get_breakpoints_for_file(&mut self, path: impl AsRef<Path>) -> &mut Vec<Breakpoint> {
        let path = standardize_path(path);
        let key = self
            .breakpoints_by_file_path
            .keys()
            .find(|key| paths_equal(key, &path))
            .cloned()
            .unwrap_or(path);
        self.breakpoints_by_file_path.entry(key).or_default()
    }

    /// Add a breakpoint on the first line of the channel's entry function.
    ///
    /// A user breakpoint on the same line takes precedence over it.
    #[tracing::instrument(skip(self))]
    pub async fn register_entry_breakpoint(&mut self, staging_root: &Path) -> eyre::Result<()> {
        let entry_point = self
            .resolver
            .find_entry_point(staging_root)
            .await?
            .ok_or_else(|| {
                eyre::eyre!(
                    "could not find an entry point (sub Main or RunUserInterface) in {}",
                    staging_root.display()
                )
            })?;

        let id = self.next_id();
        let entry_breakpoint = Breakpoint {
            id: Some(id),
            line: entry_point.line_number + 1,
            verified: true,
            was_added_before_launch: true,
            is_entry_breakpoint: true,
            ..Default::default()
        };

        let breakpoints = self.get_breakpoints_for_file(&entry_point.path);
        // requests arrive in any order
        breakpoints.sort_by_key(|b| b.line);
        let index = breakpoints.partition_point(|b| b.line <= entry_breakpoint.line);
        let clashes = (index > 0 && breakpoints[index - 1].line == entry_breakpoint.line)
            || breakpoints
                .get(index)
                .is_some_and(|b| b.line == entry_breakpoint.line);
        if clashes {
            tracing::debug!("user breakpoint already on the entry line");
            return Ok(());
        }
        breakpoints.insert(index, entry_breakpoint);
        Ok(())
    }

    /// Every edit needed to instrument the staged project, grouped by staged
    /// file and ordered by position. Only one breakpoint per line is kept.
    #[tracing::instrument(skip(self))]
    pub async fn get_breakpoint_work(
        &self,
        project: &Project,
    ) -> eyre::Result<BTreeMap<PathBuf, Vec<BreakpointWorkItem>>> {
        let source_roots = project.source_roots();
        let mut work: BTreeMap<PathBuf, Vec<BreakpointWorkItem>> = BTreeMap::new();

        for (source_file_path, breakpoints) in &self.breakpoints_by_file_path {
            for breakpoint in breakpoints {
                let staging = self
                    .resolver
                    .get_staging_locations_from_source_location(
                        source_file_path,
                        breakpoint.line,
                        breakpoint.column,
                        &source_roots,
                        &project.staging_folder_path,
                    )
                    .await
                    .wrap_err_with(|| {
                        format!(
                            "locating {}:{} in the staging folder",
                            source_file_path.display(),
                            breakpoint.line
                        )
                    })?;
                if staging.locations.is_empty() {
                    tracing::debug!(
                        path = %source_file_path.display(),
                        line = breakpoint.line,
                        "breakpoint is not part of the staged project"
                    );
                }

                for location in staging.locations {
                    work.entry(location.file_path.clone())
                        .or_default()
                        .push(BreakpointWorkItem {
                            source_file_path: source_file_path.clone(),
                            staging_file_path: location.file_path,
                            line_number: location.line_number,
                            column_index: location.column_index,
                            condition: breakpoint.condition.clone(),
                            hit_condition: breakpoint.hit_condition.clone(),
                            log_message: breakpoint.log_message.clone(),
                            kind: staging.kind,
                        });
                }
            }
        }

        for items in work.values_mut() {
            items.sort_by_key(|item| (item.line_number, item.column_index));
            items.dedup_by_key(|item| item.line_number);
        }
        Ok(work)
    }

    /// Write every breakpoint into the staging folder, one task per file.
    #[tracing::instrument(skip(self))]
    pub async fn write_breakpoints_for_project(&mut self, project: &Project) -> eyre::Result<()> {
        let work = self.get_breakpoint_work(project).await?;
        let enable_source_maps = self.options.enable_source_maps;

        // counter names are handed out up front so the files can be
        // rewritten in any order
        let rewrites: Vec<_> = work
            .into_iter()
            .map(|(staging_file_path, items)| {
                let statements = self.statements_for(&items);
                rewrite_staged_file(staging_file_path, items, statements, enable_source_maps)
            })
            .collect();

        futures::future::try_join_all(rewrites).await?;
        Ok(())
    }

    /// Inject the statements for `items` into `contents`, a staged file
    /// whose lines map to `original_path`.
    ///
    /// The map is `None` when source maps are disabled.
    pub fn get_source_and_map_with_breakpoints(
        &mut self,
        contents: &str,
        original_path: &Path,
        items: &[BreakpointWorkItem],
    ) -> (String, Option<SourceMap>) {
        let statements = self.statements_for(items);
        inject_statements(
            contents,
            original_path,
            items,
            &statements,
            self.options.enable_source_maps,
        )
    }

    /// The statements to inject for each of `items`.
    fn statements_for(&mut self, items: &[BreakpointWorkItem]) -> Vec<Vec<String>> {
        items
            .iter()
            .map(|item| breakpoint_lines(item, &mut self.hit_counters))
            .collect()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.breakpoint_id_counter;
        self.breakpoint_id_counter += 1;
        id
    }
}

/// Put `statements[i]` in front of the line `items[i]` points at.
fn inject_statements(
    contents: &str,
    original_path: &Path,
    items: &[BreakpointWorkItem],
    statements: &[Vec<String>],
    enable_source_maps: bool,
) -> (String, Option<SourceMap>) {
    let source = original_path.to_string_lossy();
    let mut builder = SourceMapBuilder::new();

    let lines = split_lines(contents);
    let last = lines.len().saturating_sub(1);
    for (index, line) in lines.into_iter().enumerate() {
        let line_number = index as u32 + 1;
        let injected = items
            .iter()
            .zip(statements)
            .filter(|(item, _)| item.line_number == line_number);
        for (item, item_statements) in injected {
            for statement in item_statements {
                builder.add_mapped(statement, &source, item.line_number, 0);
                builder.add_unmapped("\n");
            }
        }
        if index == last {
            builder.add_mapped(line, &source, line_number, 0);
        } else {
            builder.add_mapped(&format!("{line}\n"), &source, line_number, 0);
        }
    }

    if enable_source_maps {
        let (code, map) = builder.into_code_and_map(None);
        (code, Some(map))
    } else {
        (builder.into_code(), None)
    }
}

/// The file the lines of a staged file should map back to: the staged file
/// itself when an existing map will be merged in, the source file
/// otherwise.
fn original_path_for(items: &[BreakpointWorkItem]) -> PathBuf {
    match items.first() {
        Some(item) if item.kind == LocationKind::SourceMap => item.staging_file_path.clone(),
        Some(item) => item.source_file_path.clone(),
        None => PathBuf::new(),
    }
}

/// Move a path under the root dir to the same relative path in the source
/// dirs. The last source dir that has the file wins; the path is kept as
/// is when none does.
fn remap_into_source_dirs(path: &Path, locked: &Locked) -> PathBuf {
    let Some(relative) = strip_prefix_ignore_case(path, &locked.root_dir) else {
        return path.to_path_buf();
    };
    locked
        .source_dirs
        .iter()
        .map(|dir| dir.join(&relative))
        .filter(|candidate| candidate.exists())
        .last()
        .unwrap_or_else(|| path.to_path_buf())
}

/// Split on any of `\r\n`, `\r` and `\n`.
fn split_lines(contents: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = contents.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&contents[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&contents[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    lines.push(&contents[start..]);
    lines
}

/// Read, instrument and write back one staged file.
#[tracing::instrument(skip(items, statements))]
async fn rewrite_staged_file(
    staging_file_path: PathBuf,
    items: Vec<BreakpointWorkItem>,
    statements: Vec<Vec<String>>,
    enable_source_maps: bool,
) -> eyre::Result<()> {
    let contents = tokio::fs::read_to_string(&staging_file_path)
        .await
        .wrap_err_with(|| format!("reading {}", staging_file_path.display()))?;
    let original_path = original_path_for(&items);
    let (code, map) = inject_statements(
        &contents,
        &original_path,
        &items,
        &statements,
        enable_source_maps,
    );
    write_staged_file(staging_file_path, code, map).await
}

#[tracing::instrument(skip(code, map))]
async fn write_staged_file(
    staging_file_path: PathBuf,
    code: String,
    map: Option<SourceMap>,
) -> eyre::Result<()> {
    if let Some(map) = map {
        let map_path = map_path_for(&staging_file_path);
        let map = if tokio::fs::try_exists(&map_path).await.unwrap_or(false) {
            let existing = SourceMap::load(&map_path).await?;
            sourcemap::merge(&existing, &map)
                .wrap_err_with(|| format!("merging into {}", map_path.display()))?
        } else {
            map
        };
        tokio::fs::write(&map_path, map.to_json()?)
            .await
            .wrap_err_with(|| format!("writing {}", map_path.display()))?;
    }

    tokio::fs::write(&staging_file_path, code)
        .await
        .wrap_err_with(|| format!("writing {}", staging_file_path.display()))?;
    tracing::debug!("wrote breakpoints");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_every_line_ending() {
        assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\n"), vec!["a", ""]);
        assert_eq!(split_lines(""), vec![""]);
    }
}
