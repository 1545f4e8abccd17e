/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    StepOver,
    StepInto,
    StepOut,
    Pause,
    Backtrace,
    Threads,
    Variables,
    Print(String),
    /// `b path:line`
    Break(String),
    Raw(String),
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some(raw) = input.strip_prefix('!') {
            return Command::Raw(raw.trim().to_string());
        }
        if let Some(expression) = input.strip_prefix("print ") {
            return Command::Print(expression.trim().to_string());
        }
        if let Some(location) = input.strip_prefix("b ") {
            return Command::Break(location.trim().to_string());
        }

        match input {
            "c" => Command::Continue,
            "n" => Command::StepOver,
            "s" => Command::StepInto,
            "o" => Command::StepOut,
            "p" => Command::Pause,
            "bt" => Command::Backtrace,
            "threads" => Command::Threads,
            "vars" => Command::Variables,
            "q" => Command::Quit,
            "" => Command::Empty,
            other => Command::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("c"), Command::Continue);
        assert_eq!(Command::parse(" n "), Command::StepOver);
        assert_eq!(Command::parse("bt"), Command::Backtrace);
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("print m.top"), Command::Print("m.top".into()));
        assert_eq!(
            Command::parse("b source/main.brs:12"),
            Command::Break("source/main.brs:12".into())
        );
        assert_eq!(Command::parse("! var"), Command::Raw("var".into()));
        assert_eq!(Command::parse("!bt"), Command::Raw("bt".into()));
        assert_eq!(Command::parse("hello"), Command::Unknown("hello".into()));
    }
}
