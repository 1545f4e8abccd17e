//! Compile diagnostics scraped from the device console.
//!
//! Each pass looks for one shape of error in the text printed while the
//! channel compiles. The passes are independent and their results are
//! concatenated.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const ERR_COMPILE: &str = "ERR_COMPILE:";
const XML_MESSAGE: &str = "general compile error in xml file";
const LIVECOMPILE: &str = "$livecompile";

/// Separates the per-file blocks of a multi-file error report.
const FILE_BANNER: &str = "=================================================================";

static SYNTAX_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(syntax|compile) error.* in (.*)\((\d+)\)").expect("valid syntax error regex")
});
static FILE_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)found(?:.*)file (.*)$").expect("valid file info regex"));
static LINE_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^--- Line (\d*): (.*)$").expect("valid line error regex"));
static SINGLE_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-------> Error parsing XML component (.*).*$").expect("valid xml error regex")
});
static MULTIPLE_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-------> Error parsing multiple XML components \((.*)\)")
        .expect("valid multiple xml error regex")
});

/// A compile error reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    pub path: String,
    /// 0-based
    pub line_number: u32,
    pub message: String,
    pub error_text: String,
    pub char_start: u32,
    pub char_end: u32,
}

impl CompileError {
    fn new(path: impl Into<String>, line_number: u32, message: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line_number,
            message: message.into(),
            error_text: error_text.into(),
            char_start: 0,
            char_end: 999,
        }
    }
}

/// Collects the results of one pass, applying the livecompile rule: a path
/// mentioning `$livecompile` means the device recompiled, so everything
/// found so far is stale.
#[derive(Default)]
struct Pass {
    errors: Vec<CompileError>,
}

impl Pass {
    fn push(&mut self, error: CompileError) {
        if error.path.to_lowercase().contains(LIVECOMPILE) {
            self.errors.clear();
        } else {
            self.errors.push(error);
        }
    }
}

/// `syntax error found in pkg:/source/main.brs(12)` style lines.
pub fn syntax_errors(lines: &[String]) -> Vec<CompileError> {
    let mut pass = Pass::default();
    for line in lines {
        let Some(captures) = SYNTAX_ERROR.captures(line) else {
            continue;
        };
        let line_number = captures[3].parse::<u32>().unwrap_or(1).saturating_sub(1);
        pass.push(CompileError::new(
            &captures[2],
            line_number,
            &captures[0],
            line.as_str(),
        ));
    }
    pass.errors
}

/// Multi-file reports, one block per file between banners. A block that
/// lists `--- Line N: message` entries produces one error per entry,
/// otherwise the whole block is reported against the first line.
pub fn compile_errors(lines: &[String]) -> Vec<CompileError> {
    let text = lines.join("\n");
    let blocks: Vec<&str> = text.split(FILE_BANNER).collect();
    if blocks.len() < 2 {
        return Vec::new();
    }

    let mut pass = Pass::default();
    for block in &blocks[1..blocks.len() - 1] {
        let Some(captures) = FILE_INFO.captures(block) else {
            continue;
        };
        let path = captures[1].trim();

        let line_errors = line_errors(path, block);
        if line_errors.is_empty() {
            pass.push(CompileError::new(path, 0, *block, ERR_COMPILE));
        } else {
            for error in line_errors {
                pass.push(error);
            }
        }
    }
    pass.errors
}

/// The `--- Line N: message` entries of one file block.
pub fn line_errors(path: &str, block: &str) -> Vec<CompileError> {
    LINE_ERROR
        .captures_iter(block)
        .map(|captures| {
            let line_number = captures[1].parse::<u32>().unwrap_or(1).saturating_sub(1);
            CompileError::new(path, line_number, captures[2].trim_end(), ERR_COMPILE)
        })
        .collect()
}

/// `-------> Error parsing XML component <path>`
pub fn single_file_xml_errors(lines: &[String]) -> Vec<CompileError> {
    let mut pass = Pass::default();
    for line in lines {
        if let Some(captures) = SINGLE_XML.captures(line) {
            pass.push(CompileError::new(captures[1].trim(), 0, XML_MESSAGE, ERR_COMPILE));
        }
    }
    pass.errors
}

/// `-------> Error parsing multiple XML components (<path>, <path>)`
pub fn multiple_file_xml_errors(lines: &[String]) -> Vec<CompileError> {
    let mut pass = Pass::default();
    for line in lines {
        let Some(captures) = MULTIPLE_XML.captures(line) else {
            continue;
        };
        for path in captures[1].split(',') {
            pass.push(CompileError::new(path.trim(), 0, XML_MESSAGE, ERR_COMPILE));
        }
    }
    pass.errors
}

/// Run every pass over `lines`.
pub fn extract_all(lines: &[String]) -> Vec<CompileError> {
    let mut errors = syntax_errors(lines);
    errors.extend(compile_errors(lines));
    errors.extend(multiple_file_xml_errors(lines));
    errors.extend(single_file_xml_errors(lines));
    errors
}

/// Keep only errors in files the editor can show.
pub fn reportable(errors: Vec<CompileError>) -> Vec<CompileError> {
    errors
        .into_iter()
        .filter(|e| {
            let path = e.path.to_lowercase();
            path.ends_with(".brs") || path.ends_with(".xml")
        })
        .collect()
}
