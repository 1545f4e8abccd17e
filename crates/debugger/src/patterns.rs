//! Recognisers for the fixed lines the device prints.
//!
//! Every pattern the adapter reacts to lives behind one of these functions,
//! so each transition can be tested on a single line of text.

use std::sync::LazyLock;

use regex::Regex;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("valid regex ", stringify!($name))));
    };
}

pattern!(COMPILING_BANNER, r"(?i)------\s+compiling.*------");
pattern!(RUNNING_BANNER, r"(?i)------\s+Running.*------");
pattern!(APP_RUNNING_MARKER, r"(?i)\[scrpt\.ctx\.run\.enter\]");
pattern!(PROMPT_AT_END, r"(?i)Brightscript\s*Debugger>\s*$");
pattern!(PROMPT_ANYWHERE, r"(?i)Brightscript Debugger>");
pattern!(CANNOT_CONTINUE, r"(?i)can't continue");
pattern!(MICRO_DEBUGGER_START, r"(?i)BrightScript Micro Debugger\.");

/// `------ Compiling dev 'My Channel' ------`
pub fn is_compiling_banner(line: &str) -> bool {
    COMPILING_BANNER.is_match(line)
}

/// `------ Running dev 'My Channel' main ------`
pub fn is_running_banner(line: &str) -> bool {
    RUNNING_BANNER.is_match(line)
}

/// The marker printed when the channel's script context starts.
pub fn is_app_running_marker(text: &str) -> bool {
    APP_RUNNING_MARKER.is_match(text.trim())
}

/// Whether `text` ends at the debugger prompt.
pub fn ends_at_prompt(text: &str) -> bool {
    PROMPT_AT_END.is_match(text.trim())
}

/// Whether `line` contains the debugger prompt.
pub fn contains_prompt(line: &str) -> bool {
    PROMPT_ANYWHERE.is_match(line)
}

pub fn is_cannot_continue(text: &str) -> bool {
    CANNOT_CONTINUE.is_match(text.trim())
}

/// The first line of a micro debugger session.
pub fn is_micro_debugger_start(line: &str) -> bool {
    MICRO_DEBUGGER_START.is_match(line)
}

/// A break reported from inside the micro debugger.
pub fn is_break_line(line: &str) -> bool {
    line.starts_with("Break in ")
}

/// Split `text` on any of `\r\n`, `\r` and `\n`.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find(['\r', '\n']) {
        lines.push(&rest[..idx]);
        let skip = if rest[idx..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[idx + skip..];
    }
    lines.push(rest);
    lines
}
