//! Parsers for the replies of the debugger console commands.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AdapterError;
use crate::patterns::{contains_prompt, split_lines};

static THREAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)(\*?)\s+(.*?)\((\d+)\)\s+(.*)$").expect("valid thread regex")
});
static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)#(\d+)\s+(?:function|sub)\s+([$\w]+).*\s+file/line:\s+(.*)\((\d+)\)")
        .expect("valid stack frame regex")
});
static FIRST_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w.\-=]*)\s").expect("valid first word regex"));
static EXPRESSION_DETAILS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(.+?)[\r\n]+brightscript debugger>").expect("valid expression regex")
});
static HIGH_LEVEL_TYPE_DETAILS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(.*):\s*(\w+\s*:*\s*[\w.]*)>").expect("valid type details regex")
});
static OBJECT_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+[^:]):(.+)").expect("valid object entry regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub is_selected: bool,
    pub line_number: u32,
    pub file_path: String,
    pub line_contents: String,
    pub thread_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub frame_id: u32,
    pub file_path: String,
    pub line_number: u32,
    pub function_identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighLevelType {
    Primitive,
    Array,
    Object,
    Function,
    Uninitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Invalid,
    Boolean,
    String,
    Integer,
    Float,
}

impl PrimitiveType {
    /// Guess the type of a printed value.
    pub fn from_value(value: &str) -> Self {
        let value = value.trim().to_lowercase();
        if value.is_empty() || value == "invalid" {
            PrimitiveType::Invalid
        } else if value == "true" || value == "false" {
            PrimitiveType::Boolean
        } else if value.contains('"') {
            PrimitiveType::String
        } else if value.contains('.') {
            PrimitiveType::Float
        } else {
            PrimitiveType::Integer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Invalid => "Invalid",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::String => "String",
            PrimitiveType::Integer => "Integer",
            PrimitiveType::Float => "Float",
        }
    }
}

/// A value read from the device, with one level of children for arrays and
/// objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateContainer {
    pub name: String,
    pub evaluate_name: String,
    pub variable_type: String,
    pub value: String,
    pub high_level_type: HighLevelType,
    pub children: Vec<EvaluateContainer>,
}

/// Parse the reply to `threads`. The selected thread comes first.
pub fn parse_threads(data: &str) -> Vec<Thread> {
    let mut threads: Vec<Thread> = split_lines(data)
        .into_iter()
        .filter_map(|line| {
            let captures = THREAD.captures(line)?;
            Some(Thread {
                thread_id: captures[1].parse().ok()?,
                is_selected: !captures[2].is_empty(),
                file_path: captures[3].trim().to_string(),
                line_number: captures[4].parse().ok()?,
                line_contents: captures[5].trim().to_string(),
            })
        })
        .collect();
    threads.sort_by_key(|thread| !thread.is_selected);
    threads
}

/// Parse the reply to `bt`, innermost frame first.
///
/// Frame ids are the device's own `#N` indices.
pub fn parse_stack_trace(data: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = STACK_FRAME
        .captures_iter(data)
        .filter_map(|captures| {
            Some(StackFrame {
                frame_id: captures[1].parse().ok()?,
                function_identifier: captures[2].to_string(),
                file_path: captures[3].trim().to_string(),
                line_number: captures[4].parse().ok()?,
            })
        })
        .collect();
    frames.sort_by_key(|frame| frame.frame_id);
    frames
}

/// Parse the reply to `var` into variable names.
pub fn parse_scope_variables(data: &str) -> Vec<String> {
    data.split('\n')
        .filter(|line| !contains_prompt(line))
        .filter_map(|line| FIRST_WORD.captures(line))
        .map(|captures| captures[1].to_string())
        .filter(|name| !name.is_empty() && name != "global")
        .collect()
}

/// The printed value in front of the prompt.
pub fn expression_details(data: &str) -> Option<&str> {
    EXPRESSION_DETAILS
        .captures(data)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Classify a type name as returned by `Type()`.
pub fn high_level_type(expression_type: Option<&str>) -> Result<HighLevelType, AdapterError> {
    let Some(expression_type) = expression_type.filter(|t| !t.is_empty()) else {
        return Err(AdapterError::UnknownExpressionType(
            expression_type.map(str::to_string),
        ));
    };

    let high_level_type = match expression_type.to_lowercase().as_str() {
        "boolean" | "integer" | "longinteger" | "float" | "double" | "string" | "rostring"
        | "invalid" => HighLevelType::Primitive,
        "roarray" => HighLevelType::Array,
        "function" => HighLevelType::Function,
        "<uninitialized>" => HighLevelType::Uninitialized,
        _ => HighLevelType::Object,
    };
    Ok(high_level_type)
}

/// The children of a printed `roArray`, one per line between `[` and `]`.
pub fn array_children(expression: &str, data: &str) -> Result<Vec<EvaluateContainer>, AdapterError> {
    let mut children = Vec::new();
    for line in split_lines(data).into_iter().skip(2) {
        let line = line.trim();
        if line == "]" {
            return Ok(children);
        }
        let index = children.len();
        children.push(child(
            index.to_string(),
            format!("{expression}[{index}]"),
            line,
            line,
        )?);
    }
    Err(AdapterError::MalformedOutput {
        what: "array",
        data: data.to_string(),
    })
}

/// The children of a printed object, one `name: value` per line between
/// `{` and `}`.
pub fn object_children(expression: &str, data: &str) -> Result<Vec<EvaluateContainer>, AdapterError> {
    let malformed = || AdapterError::MalformedOutput {
        what: "object",
        data: data.to_string(),
    };

    let mut children = Vec::new();
    for line in split_lines(data).into_iter().skip(2) {
        let line = line.trim();
        if line == "}" {
            return Ok(children);
        }
        let captures = OBJECT_ENTRY.captures(line).ok_or_else(malformed)?;
        let name = captures[1].trim();
        let value = captures[2].trim();
        children.push(child(
            name.to_string(),
            format!("{expression}.{name}"),
            line,
            value,
        )?);
    }
    Err(malformed())
}

fn child(
    name: String,
    evaluate_name: String,
    line: &str,
    value: &str,
) -> Result<EvaluateContainer, AdapterError> {
    let container = match HIGH_LEVEL_TYPE_DETAILS.captures(line) {
        Some(captures) => {
            let variable_type = if captures[1].trim().eq_ignore_ascii_case("function") {
                "Function".to_string()
            } else {
                captures[2].trim().to_string()
            };
            EvaluateContainer {
                name,
                evaluate_name,
                high_level_type: high_level_type(Some(&variable_type))?,
                value: variable_type.clone(),
                variable_type,
                children: Vec::new(),
            }
        }
        None => EvaluateContainer {
            name,
            evaluate_name,
            variable_type: PrimitiveType::from_value(value).as_str().to_string(),
            value: value.to_string(),
            high_level_type: HighLevelType::Primitive,
            children: Vec::new(),
        },
    };
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_put_the_selected_one_first() {
        let data = " ID    Location                                Source Code\r\n\
                    \x20 0    pkg:/components/Foo.brs(12)              x = 1\r\n\
                    \x20 1*   pkg:/source/main.brs(20)                 print \"hello(2)\"\r\n\
                    \x20 *selected\r\n\
                    Brightscript Debugger> ";
        let threads = parse_threads(data);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].thread_id, 1);
        assert!(threads[0].is_selected);
        assert_eq!(threads[0].file_path, "pkg:/source/main.brs");
        assert_eq!(threads[0].line_number, 20);
        assert_eq!(threads[0].line_contents, "print \"hello(2)\"");
        assert_eq!(threads[1].thread_id, 0);
    }

    #[test]
    fn stack_trace_innermost_first() {
        let data = "#1  Function main() As Void\r\n\
                    \x20  file/line: pkg:/source/main.brs(10)\r\n\
                    #0  Function helper(x As Integer) As Integer\r\n\
                    \x20  file/line: pkg:/source/lib.brs(3)\r\n\
                    Brightscript Debugger> ";
        let frames = parse_stack_trace(data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function_identifier, "helper");
        assert_eq!(frames[0].file_path, "pkg:/source/lib.brs");
        assert_eq!(frames[0].line_number, 3);
        assert_eq!(frames[0].frame_id, 0);
        assert_eq!(frames[1].function_identifier, "main");
        assert_eq!(frames[1].frame_id, 1);
    }

    #[test]
    fn stack_trace_keeps_device_indices() {
        let data = "#4  Function main() As Void\r\n\
                    \x20  file/line: pkg:/source/main.brs(10)\r\n\
                    #2  Sub onKey(key As String)\r\n\
                    \x20  file/line: pkg:/components/Scene.brs(31)\r\n";
        let frames = parse_stack_trace(data);
        let ids: Vec<u32> = frames.iter().map(|frame| frame.frame_id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(frames[0].function_identifier, "onKey");
    }

    #[test]
    fn scope_variables_skip_global() {
        let data = "global           Interface:ifGlobal\r\n\
                    m                roAssociativeArray refcnt=2 count:0\r\n\
                    count            Integer val:3\r\n\
                    Brightscript Debugger> ";
        assert_eq!(parse_scope_variables(data), vec!["m", "count"]);
    }

    #[test]
    fn expression_details_stop_at_the_prompt() {
        assert_eq!(
            expression_details("roAssociativeArray\r\nBrightscript Debugger> "),
            Some("roAssociativeArray")
        );
        assert_eq!(expression_details("no prompt here"), None);
    }

    #[test]
    fn primitive_type_from_value() {
        assert_eq!(PrimitiveType::from_value("invalid"), PrimitiveType::Invalid);
        assert_eq!(PrimitiveType::from_value("TRUE"), PrimitiveType::Boolean);
        assert_eq!(PrimitiveType::from_value("\"x\""), PrimitiveType::String);
        assert_eq!(PrimitiveType::from_value("1.5"), PrimitiveType::Float);
        assert_eq!(PrimitiveType::from_value("42"), PrimitiveType::Integer);
    }

    #[test]
    fn high_level_types() {
        assert_eq!(high_level_type(Some("roString")).unwrap(), HighLevelType::Primitive);
        assert_eq!(high_level_type(Some("roArray")).unwrap(), HighLevelType::Array);
        assert_eq!(high_level_type(Some("Function")).unwrap(), HighLevelType::Function);
        assert_eq!(
            high_level_type(Some("<uninitialized>")).unwrap(),
            HighLevelType::Uninitialized
        );
        assert_eq!(
            high_level_type(Some("roAssociativeArray")).unwrap(),
            HighLevelType::Object
        );
        assert!(high_level_type(None).is_err());
    }

    #[test]
    fn array_children_one_level() {
        let data = "<Component: roArray> =\n[\n    1\n    \"two\"\n    <Component: roAssociativeArray>\n]";
        let children = array_children("list", data).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].evaluate_name, "list[0]");
        assert_eq!(children[0].variable_type, "Integer");
        assert_eq!(children[1].variable_type, "String");
        assert_eq!(children[2].high_level_type, HighLevelType::Object);
        assert_eq!(children[2].value, "roAssociativeArray");
    }

    #[test]
    fn object_children_one_level() {
        let data = "<Component: roAssociativeArray> =\n{\n    count: 3\n    ratio: 0.5\n    items: <Component: roArray>\n    run: <Function: run>\n}";
        let children = object_children("m", data).unwrap();
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["count", "ratio", "items", "run"]);
        assert_eq!(children[0].evaluate_name, "m.count");
        assert_eq!(children[0].value, "3");
        assert_eq!(children[0].variable_type, "Integer");
        assert_eq!(children[1].variable_type, "Float");
        assert_eq!(children[2].high_level_type, HighLevelType::Array);
        assert_eq!(children[3].high_level_type, HighLevelType::Function);
    }

    #[test]
    fn unterminated_output_is_malformed() {
        let data = "<Component: roArray> =\n[\n    1";
        match array_children("list", data) {
            Err(AdapterError::MalformedOutput { what, data: raw }) => {
                assert_eq!(what, "array");
                assert_eq!(raw, data);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(object_children("m", "<Component: roAssociativeArray> =\n{\n    nonsense\n}").is_err());
    }
}
