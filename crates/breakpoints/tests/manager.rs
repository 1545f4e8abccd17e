use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use breakpoints::files::map_path_for;
use breakpoints::sourcemap::{SourceMap, SourceMapBuilder};
use breakpoints::{
    BreakpointManager, BreakpointOptions, Project, SourceBreakpoint, StagingFileResolver,
    source_location_for,
};
use tracing_subscriber::EnvFilter;

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

/// A project folder and its staged copy.
struct Workspace {
    _dir: tempfile::TempDir,
    project: Project,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let project = Project {
            root_dir: root.join("project"),
            source_dirs: Vec::new(),
            staging_folder_path: root.join("staging"),
        };
        std::fs::create_dir_all(&project.root_dir).unwrap();
        std::fs::create_dir_all(&project.staging_folder_path).unwrap();
        Self { _dir: dir, project }
    }

    /// Write `contents` to `relative` in both the project and staging.
    fn add_file(&self, relative: &str, contents: &str) -> PathBuf {
        for base in [&self.project.root_dir, &self.project.staging_folder_path] {
            let path = base.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();
        }
        self.project.root_dir.join(relative)
    }

    fn staged(&self, relative: &str) -> PathBuf {
        self.project.staging_folder_path.join(relative)
    }
}

fn manager() -> BreakpointManager {
    BreakpointManager::new(
        Box::new(StagingFileResolver),
        BreakpointOptions::default(),
    )
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn verifies_breakpoints_in_brightscript_files_only() {
    let mut manager = manager();

    for file in ["/project/source/main.brs", "/project/source/lib.bs", "/project/components/Scene.XML"] {
        let set = manager.set_breakpoints_for_file(file, &[SourceBreakpoint::at_line(2)]);
        assert!(set[0].verified, "{file}");
        assert_eq!(set[0].column, 0);
    }

    let set = manager.set_breakpoints_for_file("/project/readme.md", &[SourceBreakpoint::at_line(2)]);
    assert!(!set[0].verified);
    assert!(manager.get_breakpoints_for_file("/project/readme.md").is_empty());
}

#[test]
fn setting_the_same_breakpoints_twice_is_idempotent() {
    let mut manager = manager();
    let requested = [SourceBreakpoint::at_line(2), SourceBreakpoint::at_line(7)];

    manager.set_breakpoints_for_file("/project/source/main.brs", &requested);
    manager.set_breakpoints_for_file("/project/SOURCE/main.brs", &requested);

    let stored = manager.get_breakpoints_for_file("/project/source/main.brs");
    let lines: Vec<u32> = stored.iter().map(|b| b.line).collect();
    assert_eq!(lines, vec![2, 7]);
}

#[test]
fn after_locking_only_known_lines_are_verified() {
    let mut manager = manager();
    manager.set_breakpoints_for_file("/project/source/main.brs", &[SourceBreakpoint::at_line(2)]);
    manager.lock_breakpoints(&Project::default());

    let set = manager.set_breakpoints_for_file(
        "/project/source/main.brs",
        &[SourceBreakpoint::at_line(2), SourceBreakpoint::at_line(3)],
    );
    assert!(set[0].verified);
    assert!(set[0].was_added_before_launch);
    assert!(!set[1].verified);

    // the stored list is untouched
    let stored = manager.get_breakpoints_for_file("/project/source/main.brs");
    assert_eq!(stored.len(), 1);
}

#[test]
fn locked_breakpoints_in_root_dir_are_moved_to_source_dirs() {
    let workspace = Workspace::new();
    let source_dir = workspace.project.root_dir.parent().unwrap().join("src");
    std::fs::create_dir_all(source_dir.join("source")).unwrap();
    std::fs::write(source_dir.join("source/main.brs"), "sub main()\nend sub").unwrap();

    let mut manager = manager();
    manager.set_breakpoints_for_file(source_dir.join("source/main.brs"), &[SourceBreakpoint::at_line(2)]);
    manager.lock_breakpoints(&Project {
        source_dirs: vec![source_dir.clone()],
        ..workspace.project.clone()
    });

    let set = manager.set_breakpoints_for_file(
        workspace.project.root_dir.join("source/main.brs"),
        &[SourceBreakpoint::at_line(2)],
    );
    assert!(set[0].verified);
}

#[tokio::test]
async fn writes_stop_before_the_breakpoint_line() {
    let workspace = Workspace::new();
    let source = workspace.add_file("source/main.brs", "line1\nline2\nline3");

    let mut manager = manager();
    manager.set_breakpoints_for_file(&source, &[SourceBreakpoint::at_line(2)]);
    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();

    let staged = workspace.staged("source/main.brs");
    assert_eq!(read(&staged), "line1\nSTOP\nline2\nline3");
    // the project itself is left alone
    assert_eq!(read(&source), "line1\nline2\nline3");

    let map = SourceMap::load(map_path_for(&staged)).await.unwrap();
    let stop = map.original_position_for(2, 0).unwrap().unwrap();
    assert_eq!(stop.line, 2);
    assert_eq!(Path::new(&stop.source), source);

    let location = source_location_for(&staged, 3).await.unwrap();
    assert_eq!(location.file_path, source);
    assert_eq!(location.line_number, 2);
}

#[tokio::test]
async fn one_breakpoint_per_line() {
    let workspace = Workspace::new();
    let source = workspace.add_file("source/main.brs", "a = 1 : b = 2\nc = 3");

    let mut manager = manager();
    manager.set_breakpoints_for_file(
        &source,
        &[
            SourceBreakpoint {
                line: 1,
                column: Some(8),
                condition: Some("b = 1".to_string()),
                ..Default::default()
            },
            SourceBreakpoint::at_line(1),
        ],
    );

    let work = manager.get_breakpoint_work(&workspace.project).await.unwrap();
    let items = &work[&workspace.staged("source/main.brs")];
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].column_index, 0);
    assert_eq!(items[0].condition, None);
}

#[tokio::test]
async fn files_outside_the_staged_project_are_skipped() {
    let workspace = Workspace::new();
    workspace.add_file("source/main.brs", "a\nb");

    let mut manager = manager();
    manager.set_breakpoints_for_file("/somewhere/else/lib.brs", &[SourceBreakpoint::at_line(1)]);

    let work = manager.get_breakpoint_work(&workspace.project).await.unwrap();
    assert!(work.is_empty());
}

#[tokio::test]
async fn rewrites_several_files() {
    let workspace = Workspace::new();
    let files: Vec<PathBuf> = (0..5)
        .map(|i| workspace.add_file(&format!("source/file{i}.brs"), "first\nsecond"))
        .collect();

    let mut manager = manager();
    for file in &files {
        manager.set_breakpoints_for_file(
            file,
            &[SourceBreakpoint {
                line: 2,
                log_message: Some("at {x}".to_string()),
                ..Default::default()
            }],
        );
    }
    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();

    for i in 0..5 {
        let staged = workspace.staged(&format!("source/file{i}.brs"));
        assert_eq!(read(&staged), "first\nPRINT \"at \"; x;\"\"\nsecond");
    }
}

#[tokio::test]
async fn hit_counters_are_unique_across_rewritten_files() {
    let workspace = Workspace::new();
    let files: Vec<PathBuf> = ["a", "b", "c"]
        .iter()
        .map(|name| workspace.add_file(&format!("source/{name}.brs"), "first\nsecond"))
        .collect();

    let mut manager = manager();
    for file in &files {
        manager.set_breakpoints_for_file(
            file,
            &[SourceBreakpoint {
                line: 2,
                hit_condition: Some("3".to_string()),
                ..Default::default()
            }],
        );
    }
    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();

    let mut counters: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let written = read(&workspace.staged(&format!("source/{name}.brs")));
            let start = written.find("m.vscode_bp.bp").expect("counter in file");
            let rest = &written[start + "m.vscode_bp.".len()..];
            rest[..rest.find(' ').unwrap()].to_string()
        })
        .collect();
    counters.sort();
    assert_eq!(counters, vec!["bp1", "bp2", "bp3"]);
}

#[tokio::test]
async fn entry_breakpoint_goes_on_the_first_line_of_main() {
    let workspace = Workspace::new();
    let source = workspace.add_file(
        "source/main.brs",
        "' comment\nsub Main()\n    print \"hello\"\nend sub",
    );

    let mut manager = manager();
    manager
        .register_entry_breakpoint(&workspace.project.staging_folder_path)
        .await
        .unwrap();

    let staged = workspace.staged("source/main.brs");
    let breakpoints = manager.get_breakpoints_for_file(&staged).clone();
    assert_eq!(breakpoints.len(), 1);
    assert_eq!(breakpoints[0].line, 3);
    assert!(breakpoints[0].is_entry_breakpoint);
    assert!(breakpoints[0].verified);

    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();
    assert_eq!(
        read(&staged),
        "' comment\nsub Main()\nSTOP\n    print \"hello\"\nend sub"
    );
    assert_eq!(read(&source), "' comment\nsub Main()\n    print \"hello\"\nend sub");
}

#[tokio::test]
async fn user_breakpoint_replaces_entry_breakpoint() {
    let workspace = Workspace::new();
    workspace.add_file("source/main.brs", "function RunUserInterface()\n  x = 1\nend function");
    let staged = workspace.staged("source/main.brs");

    let mut manager = manager();
    manager.set_breakpoints_for_file(&staged, &[SourceBreakpoint::at_line(2)]);
    manager
        .register_entry_breakpoint(&workspace.project.staging_folder_path)
        .await
        .unwrap();

    let breakpoints = manager.get_breakpoints_for_file(&staged);
    assert_eq!(breakpoints.len(), 1);
    assert!(!breakpoints[0].is_entry_breakpoint);
}

#[tokio::test]
async fn user_breakpoint_on_the_entry_line_wins_in_any_order() {
    let workspace = Workspace::new();
    let body: String = (2..=10).map(|i| format!("  a = {i}\n")).collect();
    workspace.add_file("source/main.brs", &format!("sub Main()\n{body}end sub"));
    let staged = workspace.staged("source/main.brs");

    let mut manager = manager();
    let requested: Vec<SourceBreakpoint> = [9, 5, 7]
        .into_iter()
        .map(SourceBreakpoint::at_line)
        .chain([SourceBreakpoint {
            line: 2,
            condition: Some("a = 42".to_string()),
            ..Default::default()
        }])
        .collect();
    manager.set_breakpoints_for_file(&staged, &requested);
    manager
        .register_entry_breakpoint(&workspace.project.staging_folder_path)
        .await
        .unwrap();

    let breakpoints = manager.get_breakpoints_for_file(&staged).clone();
    let lines: Vec<u32> = breakpoints.iter().map(|b| b.line).collect();
    assert_eq!(lines, vec![2, 5, 7, 9]);
    assert!(breakpoints.iter().all(|b| !b.is_entry_breakpoint));

    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();
    let written = read(&staged);
    assert!(
        written.starts_with("sub Main()\nif a = 42 then : STOP : end if\n  a = 2\n"),
        "{written}"
    );
    assert_eq!(written.matches("STOP").count(), 4);
}

#[tokio::test]
async fn missing_entry_point_is_an_error() {
    let workspace = Workspace::new();
    workspace.add_file("source/lib.brs", "sub helper()\nend sub");

    let mut manager = manager();
    let result = manager
        .register_entry_breakpoint(&workspace.project.staging_folder_path)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn merges_into_an_existing_source_map() {
    let workspace = Workspace::new();
    let original = workspace.project.root_dir.join("source/main.bs");
    std::fs::create_dir_all(original.parent().unwrap()).unwrap();
    std::fs::write(&original, "x = 1\ny = 2").unwrap();

    // a transpiled file with a generated header line
    let staged = workspace.staged("source/main.brs");
    std::fs::create_dir_all(staged.parent().unwrap()).unwrap();
    let mut builder = SourceMapBuilder::new();
    builder.add_unmapped("' generated\n");
    builder.add_mapped("x = 1\n", &original.to_string_lossy(), 1, 0);
    builder.add_mapped("y = 2", &original.to_string_lossy(), 2, 0);
    let (code, map) = builder.into_code_and_map(Some("main.brs".to_string()));
    std::fs::write(&staged, code).unwrap();
    std::fs::write(map_path_for(&staged), map.to_json().unwrap()).unwrap();

    let mut manager = manager();
    manager.set_breakpoints_for_file(&original, &[SourceBreakpoint::at_line(2)]);
    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();

    assert_eq!(read(&staged), "' generated\nx = 1\nSTOP\ny = 2");

    let location = source_location_for(&staged, 3).await.unwrap();
    assert_eq!(location.file_path, original);
    assert_eq!(location.line_number, 2);
    let location = source_location_for(&staged, 4).await.unwrap();
    assert_eq!(location.line_number, 2);
}

#[tokio::test]
async fn no_map_is_written_when_source_maps_are_disabled() {
    let workspace = Workspace::new();
    let source = workspace.add_file("source/main.brs", "line1\nline2");

    let mut manager = BreakpointManager::new(
        Box::new(StagingFileResolver),
        BreakpointOptions {
            enable_source_maps: false,
        },
    );
    manager.set_breakpoints_for_file(&source, &[SourceBreakpoint::at_line(1)]);
    manager.write_breakpoints_for_project(&workspace.project).await.unwrap();

    let staged = workspace.staged("source/main.brs");
    assert_eq!(read(&staged), "STOP\nline1\nline2");
    assert!(!map_path_for(&staged).exists());
}
