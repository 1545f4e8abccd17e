use std::sync::LazyLock;

use regex::Regex;

use crate::BreakpointWorkItem;

/// The object on `m` that holds the execution counters for breakpoints with
/// a hit condition.
pub const HIT_COUNTER_OBJECT: &str = "m.vscode_bp";

static LOG_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(.*?)\}").expect("valid log expression regex"));

/// Hands out counter names, unique for the lifetime of a manager.
#[derive(Debug, Default)]
pub(crate) struct HitCounters {
    issued: u32,
}

impl HitCounters {
    fn next_name(&mut self) -> String {
        self.issued += 1;
        format!("bp{}", self.issued)
    }
}

/// The statements to inject in front of the line `item` points at.
pub(crate) fn breakpoint_lines(
    item: &BreakpointWorkItem,
    counters: &mut HitCounters,
) -> Vec<String> {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    if let Some(message) = non_empty(&item.log_message) {
        return vec![log_statement(&message)];
    }
    if let Some(condition) = non_empty(&item.condition) {
        return vec![format!("if {condition} then : STOP : end if")];
    }
    if let Some(hit_condition) = non_empty(&item.hit_condition) {
        return match leading_integer(&hit_condition) {
            None | Some(0) => vec!["STOP".to_string()],
            Some(threshold) => hit_count_lines(&counters.next_name(), threshold),
        };
    }
    vec!["STOP".to_string()]
}

fn log_statement(message: &str) -> String {
    let quoted = format!("\"{message}\"");
    let expanded = LOG_EXPRESSION.replace_all(&quoted, "\"; ${1};\"");
    format!("PRINT {expanded}")
}

fn hit_count_lines(name: &str, threshold: i64) -> Vec<String> {
    let counter = format!("{HIT_COUNTER_OBJECT}.{name}");
    vec![
        format!("if Invalid = {HIT_COUNTER_OBJECT} then {HIT_COUNTER_OBJECT} = {{}}"),
        format!("if Invalid = {counter} then {counter} = 0"),
        format!("{counter} ++ : if {counter} >= {threshold} then STOP"),
    ]
}

/// Parse the integer at the start of `text`, ignoring anything after it.
fn leading_integer(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}
