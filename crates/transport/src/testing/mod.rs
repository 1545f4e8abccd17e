//! Testing utilities for the transport layer.
//!
//! [`MemoryTransport`] gives an in-memory connection and [`DeviceConsole`]
//! plays the device end of it: it reads the commands the client writes and
//! sends back scripted console output.

mod console;
mod memory;

pub use console::DeviceConsole;
pub use memory::MemoryTransport;

/// The prompt the device prints when it is ready for the next command.
pub const PROMPT: &str = "\r\nBrightscript Debugger> ";

/// Build a device reply: `body` followed by the debugger prompt.
///
/// # Example
///
/// ```
/// use transport::testing::reply;
///
/// assert_eq!(reply("1"), "1\r\nBrightscript Debugger> ");
/// ```
pub fn reply(body: &str) -> String {
    format!("{body}{PROMPT}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_debugger_prompt;

    #[test]
    fn replies_end_with_prompt() {
        assert!(is_debugger_prompt(&reply("roAssociativeArray")));
    }
}
