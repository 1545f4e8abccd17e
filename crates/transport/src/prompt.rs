use std::sync::LazyLock;

use regex::Regex;

static DEBUGGER_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Brightscript\s+Debugger>\s*$").expect("debugger prompt regex is valid")
});

/// Returns true when `text` ends with the interactive debugger prompt.
///
/// This is a heuristic: a printed value that happens to end with the prompt
/// text is indistinguishable from the real prompt.
pub fn is_debugger_prompt(text: &str) -> bool {
    DEBUGGER_PROMPT.is_match(text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_at_end() {
        assert!(is_debugger_prompt("some output\r\nBrightscript Debugger> "));
        assert!(is_debugger_prompt("BrightScript   debugger>\r\n\r\n"));
    }

    #[test]
    fn prompt_mid_stream() {
        assert!(!is_debugger_prompt("Brightscript Debugger> print x\r\n1"));
    }

    #[test]
    fn no_prompt() {
        assert!(!is_debugger_prompt("------ Running dev 'app' main ------"));
        assert!(!is_debugger_prompt(""));
    }
}
