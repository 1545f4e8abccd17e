//! Finding files and positions in the staging folder.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use eyre::WrapErr;
use regex::Regex;
use walkdir::WalkDir;

use crate::LocationKind;
use crate::sourcemap::SourceMap;

static ENTRY_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:sub|function)[ \t]+(?:main|runuserinterface)[ \t]*\(")
        .expect("valid entry point regex")
});

/// The function the device starts a channel from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub path: PathBuf,
    /// 1-based line of the `sub`/`function` declaration
    pub line_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLocation {
    pub file_path: PathBuf,
    /// 1-based
    pub line_number: u32,
    pub column_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLocations {
    pub locations: Vec<StagingLocation>,
    pub kind: LocationKind,
}

/// A position in a file the user edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_path: PathBuf,
    /// 1-based
    pub line_number: u32,
    pub column_index: u32,
}

/// Knows how source files relate to the staged copy of a project.
#[async_trait]
pub trait FileResolver: Send + Sync {
    /// Find the channel's entry function somewhere under `staging_root`.
    async fn find_entry_point(&self, staging_root: &Path) -> eyre::Result<Option<EntryPoint>>;

    /// Every place in the staging folder that `line` of `source_file` ended
    /// up at. An empty list means the file is not part of the staged
    /// project.
    async fn get_staging_locations_from_source_location(
        &self,
        source_file: &Path,
        line: u32,
        column: u32,
        source_roots: &[PathBuf],
        staging_root: &Path,
    ) -> eyre::Result<StagingLocations>;
}

/// Resolves locations by looking at the staging folder on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagingFileResolver;

#[async_trait]
impl FileResolver for StagingFileResolver {
    #[tracing::instrument(skip(self))]
    async fn find_entry_point(&self, staging_root: &Path) -> eyre::Result<Option<EntryPoint>> {
        for path in files_with_extension(staging_root, ".brs").await? {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            if let Some(found) = ENTRY_POINT.find(&contents) {
                let line_number = contents[..found.start()].matches('\n').count() as u32 + 1;
                tracing::debug!(path = %path.display(), line_number, "found entry point");
                return Ok(Some(EntryPoint { path, line_number }));
            }
        }
        Ok(None)
    }

    #[tracing::instrument(skip(self, source_roots))]
    async fn get_staging_locations_from_source_location(
        &self,
        source_file: &Path,
        line: u32,
        column: u32,
        source_roots: &[PathBuf],
        staging_root: &Path,
    ) -> eyre::Result<StagingLocations> {
        let source_file = standardize_path(source_file);
        let staging_root = standardize_path(staging_root);

        // already a staged file
        if strip_prefix_ignore_case(&source_file, &staging_root).is_some() {
            return Ok(StagingLocations {
                locations: vec![StagingLocation {
                    file_path: source_file,
                    line_number: line,
                    column_index: column,
                }],
                kind: LocationKind::SourceDirs,
            });
        }

        let mut locations = Vec::new();
        for map_path in files_with_extension(&staging_root, ".map").await? {
            let map = match SourceMap::load(&map_path).await {
                Ok(map) => map,
                Err(error) => {
                    tracing::warn!(path = %map_path.display(), %error, "ignoring unreadable source map");
                    continue;
                }
            };
            let map_dir = map_path.parent().unwrap_or(Path::new(""));
            let generated_file = map_path.with_extension("");
            let positions = map.generated_positions_for(
                |source| paths_equal(&resolve_map_source(&map, source, map_dir), &source_file),
                line,
            )?;
            locations.extend(positions.into_iter().map(|position| StagingLocation {
                file_path: generated_file.clone(),
                line_number: position.line,
                column_index: position.column,
            }));
        }
        if !locations.is_empty() {
            return Ok(StagingLocations {
                locations,
                kind: LocationKind::SourceMap,
            });
        }

        for root in source_roots {
            let Some(relative) = strip_prefix_ignore_case(&source_file, &standardize_path(root))
            else {
                continue;
            };
            let staged = staging_root.join(relative);
            if tokio::fs::try_exists(&staged).await.unwrap_or(false) {
                locations.push(StagingLocation {
                    file_path: staged,
                    line_number: line,
                    column_index: column,
                });
                break;
            }
        }
        Ok(StagingLocations {
            locations,
            kind: LocationKind::SourceDirs,
        })
    }
}

/// Translate a position the device reported in a staged file back to the
/// file it came from, through `<staged>.map` when there is one.
///
/// The last mapping on `line` wins, since the device does not report
/// columns.
pub async fn source_location_for(staging_file: &Path, line: u32) -> eyre::Result<SourceLocation> {
    let staging_file = standardize_path(staging_file);
    let map_path = map_path_for(&staging_file);

    if tokio::fs::try_exists(&map_path).await.unwrap_or(false) {
        let map = SourceMap::load(&map_path).await?;
        if let Some(original) = map.original_position_for(line, u32::MAX)? {
            let map_dir = map_path.parent().unwrap_or(Path::new(""));
            return Ok(SourceLocation {
                file_path: resolve_map_source(&map, &original.source, map_dir),
                line_number: original.line,
                column_index: original.column,
            });
        }
    }

    Ok(SourceLocation {
        file_path: staging_file,
        line_number: line,
        column_index: 0,
    })
}

/// `<file>.map`
pub fn map_path_for(file: &Path) -> PathBuf {
    let mut path = file.as_os_str().to_owned();
    path.push(".map");
    PathBuf::from(path)
}

/// Normalise a path so that paths to the same file compare equal: `~`
/// expanded, either slash accepted as separator, `.` and `..` resolved, and
/// a lower case drive letter.
pub fn standardize_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let expanded = match path.strip_prefix("~") {
        Ok(stripped) => match dirs::home_dir() {
            Some(home) => home.join(stripped),
            None => {
                tracing::warn!("cannot determine home directory, using path as-is");
                path.to_path_buf()
            }
        },
        Err(_) => path.to_path_buf(),
    };

    let text = expanded
        .to_string_lossy()
        .replace(['/', '\\'], std::path::MAIN_SEPARATOR_STR);

    let mut out = PathBuf::new();
    for component in Path::new(&text).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    let text = out.to_string_lossy();
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_uppercase() => {
            PathBuf::from(format!("{}{}", drive.to_ascii_lowercase(), &text[1..]))
        }
        _ => out,
    }
}

/// Whether `path` ends in one of `extensions` (given with their leading
/// dot), ignoring case.
pub fn has_any_extension(path: impl AsRef<Path>, extensions: &[&str]) -> bool {
    let Some(extension) = path.as_ref().extension() else {
        return false;
    };
    let extension = format!(".{}", extension.to_string_lossy().to_lowercase());
    extensions
        .iter()
        .any(|candidate| candidate.to_lowercase() == extension)
}

pub(crate) fn paths_equal(a: &Path, b: &Path) -> bool {
    a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
}

/// Like [`Path::strip_prefix`], comparing components without regard to
/// case.
pub(crate) fn strip_prefix_ignore_case(path: &Path, prefix: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    for expected in prefix.components() {
        let actual = components.next()?;
        if actual.as_os_str().to_string_lossy().to_lowercase()
            != expected.as_os_str().to_string_lossy().to_lowercase()
        {
            return None;
        }
    }
    Some(components.as_path().to_path_buf())
}

fn resolve_map_source(map: &SourceMap, source: &str, map_dir: &Path) -> PathBuf {
    let root = map.source_root.as_deref().unwrap_or("");
    let joined = Path::new(root).join(source);
    if joined.is_absolute() {
        standardize_path(joined)
    } else {
        standardize_path(map_dir.join(joined))
    }
}

async fn files_with_extension(root: &Path, extension: &'static str) -> eyre::Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| has_any_extension(entry.path(), &[extension]))
            .map(|entry| entry.into_path())
            .collect()
    })
    .await
    .wrap_err("walking staging folder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardize_resolves_dots_and_separators() {
        assert_eq!(
            standardize_path("/project/./source/../source\\main.brs"),
            PathBuf::from("/project/source/main.brs")
        );
        assert_eq!(standardize_path("a/../../b"), PathBuf::from("../b"));
        assert_eq!(standardize_path("/.."), PathBuf::from("/"));
    }

    #[test]
    fn standardize_lowers_drive_letter() {
        assert_eq!(
            standardize_path("C:/project/main.brs").to_string_lossy().chars().next(),
            Some('c')
        );
    }

    #[test]
    fn standardize_expands_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(standardize_path("~/main.brs"), home.join("main.brs"));
        }
    }

    #[test]
    fn extension_check_ignores_case() {
        assert!(has_any_extension("/a/main.BRS", &[".brs", ".xml"]));
        assert!(has_any_extension("/a/scene.xml", &[".brs", ".xml"]));
        assert!(!has_any_extension("/a/readme.md", &[".brs", ".xml"]));
        assert!(!has_any_extension("/a/brs", &[".brs"]));
    }

    #[test]
    fn prefix_stripping_ignores_case() {
        assert_eq!(
            strip_prefix_ignore_case(Path::new("/Project/Source/main.brs"), Path::new("/project")),
            Some(PathBuf::from("Source/main.brs"))
        );
        assert_eq!(
            strip_prefix_ignore_case(Path::new("/other/main.brs"), Path::new("/project")),
            None
        );
    }

    #[test]
    fn map_path_appends_extension() {
        assert_eq!(
            map_path_for(Path::new("/staging/main.brs")),
            PathBuf::from("/staging/main.brs.map")
        );
    }
}
