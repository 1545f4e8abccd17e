use std::path::PathBuf;
use std::str::FromStr;

use eyre::Context;

/// A `path:line` breakpoint given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointArg {
    pub path: PathBuf,
    /// 1-based
    pub line: u32,
}

impl FromStr for BreakpointArg {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path_str, lineno_str) = s
            .rsplit_once(':')
            .ok_or_else(|| eyre::eyre!("breakpoint specification '{s}' has no colon"))?;

        let line: u32 = lineno_str.parse().wrap_err("invalid line number")?;
        eyre::ensure!(line > 0, "line numbers start at 1");

        let mut path = PathBuf::from(path_str);

        // if passed a relative path, assume the current working directory
        if path.is_relative() {
            path = std::env::current_dir()
                .context("getting current working directory")?
                .join(path);
        }

        eyre::ensure!(
            path.is_file(),
            "breakpoint cannot be set on a non-existent file: {}",
            path.display()
        );

        Ok(Self { path, line })
    }
}

#[cfg(test)]
mod tests {
    macro_rules! assert_res_eq {
        ($a:expr, $b:expr) => {{
            match ($a, $b) {
                (Ok(o1), Ok(o2)) => assert_eq!(o1, o2),
                (Err(e1), Err(e2)) => {
                    let s1 = format!("{e1}");
                    let s2 = format!("{e2}");
                    assert_eq!(s1, s2);
                }
                (Err(e), Ok(o)) => panic!("not equal, Err({:?}) != Ok({:?})", e, o),
                (Ok(o), Err(e)) => panic!("not equal, Ok({:?}) != Err({:?})", o, e),
            }
        }};
    }

    macro_rules! breakpoint_from_str_tests {
        ($($name:ident: $value:expr,)*) => {
            mod breakpoint_from_str {
                use super::super::BreakpointArg;
                use std::str::FromStr;

                $(
                    #[test]
                    fn $name () {
                        let (input, expected): (&str, eyre::Result<BreakpointArg>) = $value;
                        assert_res_eq!(BreakpointArg::from_str(input), expected);
                    }
                )*
            }
        }
    }

    breakpoint_from_str_tests! {
        empty_string: ("", Err(eyre::eyre!("breakpoint specification '' has no colon"))),
        invalid_structure: ("main.brs", Err(eyre::eyre!("breakpoint specification 'main.brs' has no colon"))),
        invalid_line_number: ("main.brs:foo", Err(eyre::eyre!("invalid line number"))),
        zero_line: ("Cargo.toml:0", Err(eyre::eyre!("line numbers start at 1"))),
        success: ("Cargo.toml:3", Ok(BreakpointArg {
            path: std::env::current_dir().unwrap().join("Cargo.toml"),
            line: 3,
        })),
    }
}
