//! Revision 3 source maps.
//!
//! Lines are 1-based and columns 0-based throughout the public API, matching
//! how editors and the device report positions. The encoded `mappings`
//! string is 0-based for both.

mod builder;
mod merge;
mod vlq;

pub use builder::SourceMapBuilder;
pub use merge::merge;

use std::path::Path;

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// The JSON form of a source map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
}

/// One decoded segment of the `mappings` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

/// Where a [`Mapping`] points to, with `source` and `name` indexing into
/// [`SourceMap::sources`] and [`SourceMap::names`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: usize,
    pub line: u32,
    pub column: u32,
    pub name: Option<usize>,
}

/// A resolved position in an original file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub name: Option<String>,
}

/// A position in the generated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedPosition {
    pub line: u32,
    pub column: u32,
}

impl SourceMap {
    /// Build a map from already sorted mappings.
    pub fn from_mappings(
        file: Option<String>,
        sources: Vec<String>,
        names: Vec<String>,
        mappings: &[Mapping],
    ) -> Self {
        Self {
            version: 3,
            file,
            source_root: None,
            sources,
            sources_content: None,
            names,
            mappings: encode_mappings(mappings),
        }
    }

    pub fn from_json(contents: &str) -> eyre::Result<Self> {
        let map: SourceMap = serde_json::from_str(contents).wrap_err("parsing source map")?;
        eyre::ensure!(
            map.version == 3,
            "unsupported source map version {}",
            map.version
        );
        Ok(map)
    }

    pub fn to_json(&self) -> eyre::Result<String> {
        serde_json::to_string(self).wrap_err("serialising source map")
    }

    /// Read the map stored at `path`.
    pub async fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("reading source map {}", path.display()))?;
        Self::from_json(&contents).wrap_err_with(|| format!("loading {}", path.display()))
    }

    /// Decode the `mappings` field, sorted by generated position.
    pub fn decoded_mappings(&self) -> eyre::Result<Vec<Mapping>> {
        let mut mappings = Vec::new();
        let mut source: i64 = 0;
        let mut original_line: i64 = 0;
        let mut original_column: i64 = 0;
        let mut name: i64 = 0;

        for (line_index, line) in self.mappings.split(';').enumerate() {
            let mut generated_column: i64 = 0;
            for segment in line.split(',').filter(|s| !s.is_empty()) {
                let fields = vlq::decode_segment(segment)?;
                generated_column += fields[0];
                eyre::ensure!(generated_column >= 0, "negative column in mappings");

                let original = match fields.len() {
                    1 => None,
                    4 | 5 => {
                        source += fields[1];
                        original_line += fields[2];
                        original_column += fields[3];
                        let name_index = if fields.len() == 5 {
                            name += fields[4];
                            Some(name as usize)
                        } else {
                            None
                        };
                        eyre::ensure!(
                            source >= 0 && (source as usize) < self.sources.len(),
                            "mapping refers to unknown source {source}"
                        );
                        eyre::ensure!(
                            original_line >= 0 && original_column >= 0,
                            "negative original position in mappings"
                        );
                        Some(OriginalLocation {
                            source: source as usize,
                            line: original_line as u32 + 1,
                            column: original_column as u32,
                            name: name_index,
                        })
                    }
                    n => eyre::bail!("mapping segment {segment:?} has {n} fields"),
                };

                mappings.push(Mapping {
                    generated_line: line_index as u32 + 1,
                    generated_column: generated_column as u32,
                    original,
                });
            }
        }

        mappings.sort_by_key(|m| (m.generated_line, m.generated_column));
        Ok(mappings)
    }

    /// Find the original position for a generated one, using the closest
    /// mapping at or before `column` on the same line.
    pub fn original_position_for(
        &self,
        line: u32,
        column: u32,
    ) -> eyre::Result<Option<OriginalPosition>> {
        let mappings = self.decoded_mappings()?;
        Ok(self.original_position_in(&mappings, line, column))
    }

    pub(crate) fn original_position_in(
        &self,
        mappings: &[Mapping],
        line: u32,
        column: u32,
    ) -> Option<OriginalPosition> {
        let mapping = mappings
            .iter()
            .filter(|m| m.generated_line == line && m.generated_column <= column)
            .max_by_key(|m| m.generated_column)?;
        let original = mapping.original?;
        Some(OriginalPosition {
            source: self.sources.get(original.source)?.clone(),
            line: original.line,
            column: original.column,
            name: original.name.and_then(|i| self.names.get(i).cloned()),
        })
    }

    /// Every generated position that maps back to `line` of the source for
    /// which `is_source` returns true.
    pub fn generated_positions_for(
        &self,
        is_source: impl Fn(&str) -> bool,
        line: u32,
    ) -> eyre::Result<Vec<GeneratedPosition>> {
        let positions = self
            .decoded_mappings()?
            .into_iter()
            .filter_map(|m| {
                let original = m.original?;
                let source = self.sources.get(original.source)?;
                (original.line == line && is_source(source)).then_some(GeneratedPosition {
                    line: m.generated_line,
                    column: m.generated_column,
                })
            })
            .collect();
        Ok(positions)
    }

    /// Contents embedded for `source`, if any.
    pub fn source_content_for(&self, source: &str) -> Option<&str> {
        let index = self.sources.iter().position(|s| s == source)?;
        self.sources_content
            .as_ref()?
            .get(index)?
            .as_deref()
    }
}

fn encode_mappings(mappings: &[Mapping]) -> String {
    let mut out = String::new();
    let mut current_line = 1;
    let mut previous_column: i64 = 0;
    let mut previous_source: i64 = 0;
    let mut previous_original_line: i64 = 0;
    let mut previous_original_column: i64 = 0;
    let mut previous_name: i64 = 0;
    let mut first_in_line = true;

    for mapping in mappings {
        while current_line < mapping.generated_line {
            out.push(';');
            current_line += 1;
            previous_column = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        vlq::encode(mapping.generated_column as i64 - previous_column, &mut out);
        previous_column = mapping.generated_column as i64;

        if let Some(original) = mapping.original {
            vlq::encode(original.source as i64 - previous_source, &mut out);
            previous_source = original.source as i64;

            let original_line = original.line as i64 - 1;
            vlq::encode(original_line - previous_original_line, &mut out);
            previous_original_line = original_line;

            vlq::encode(original.column as i64 - previous_original_column, &mut out);
            previous_original_column = original.column as i64;

            if let Some(name) = original.name {
                vlq::encode(name as i64 - previous_name, &mut out);
                previous_name = name as i64;
            }
        }
    }
    out
}
