use super::{Mapping, OriginalLocation, SourceMap};

/// Concatenates text fragments while recording where each one came from.
///
/// Every mapped fragment gets a mapping at the position where it starts,
/// and another one at the start of each further line it spans.
#[derive(Debug)]
pub struct SourceMapBuilder {
    code: String,
    line: u32,
    column: u32,
    sources: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self {
            code: String::new(),
            line: 1,
            column: 0,
            sources: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// Append `text` that maps to `line` (1-based) and `column` of `source`.
    pub fn add_mapped(&mut self, text: &str, source: &str, line: u32, column: u32) {
        let source = self.source_index(source);
        let original = OriginalLocation {
            source,
            line,
            column,
            name: None,
        };
        self.push(text, Some(original));
    }

    /// Append `text` with no original position.
    pub fn add_unmapped(&mut self, text: &str) {
        self.push(text, None);
    }

    /// The code so far.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Finish building, returning the code and only the code.
    pub fn into_code(self) -> String {
        self.code
    }

    /// Finish building, returning the code and its source map.
    pub fn into_code_and_map(self, file: Option<String>) -> (String, SourceMap) {
        let map = SourceMap::from_mappings(file, self.sources, Vec::new(), &self.mappings);
        (self.code, map)
    }

    fn push(&mut self, text: &str, original: Option<OriginalLocation>) {
        if text.is_empty() {
            return;
        }

        if let Some(original) = original {
            self.mappings.push(Mapping {
                generated_line: self.line,
                generated_column: self.column,
                original: Some(original),
            });
        }

        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
                if let (Some(original), Some(_)) = (original, chars.peek()) {
                    self.mappings.push(Mapping {
                        generated_line: self.line,
                        generated_column: 0,
                        original: Some(original),
                    });
                }
            } else {
                self.column += 1;
            }
        }
        self.code.push_str(text);
    }

    fn source_index(&mut self, source: &str) -> usize {
        match self.sources.iter().position(|s| s == source) {
            Some(index) => index,
            None => {
                self.sources.push(source.to_string());
                self.sources.len() - 1
            }
        }
    }
}

impl Default for SourceMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
