use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static RUNTIME_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\r\n]+(.*)\(runtime\s+error\s+(.*)\)\s+in").expect("valid runtime error regex")
});

/// Codes the device uses for `STOP` and `scriptBreak()`, which are not
/// crashes.
const INTENTIONAL_STOP_CODES: [&str; 2] = ["&hf7", "&hf8"];

/// A crash reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeError {
    pub message: String,
    /// lower case, e.g. `&h18`
    pub error_code: String,
}

impl RuntimeError {
    /// Find a runtime error in console output.
    pub fn find(text: &str) -> Option<Self> {
        let captures = RUNTIME_ERROR.captures(text)?;
        let error_code = captures[2].trim().to_lowercase();
        if INTENTIONAL_STOP_CODES.contains(&error_code.as_str()) {
            return None;
        }
        Some(Self {
            message: captures[1].trim().to_string(),
            error_code,
        })
    }
}
