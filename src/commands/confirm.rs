use std::io::{self, BufRead, Write};

const PROMPT: &str = "Input 'continue' to proceed or 'exit' to quit: ";
const INVALID_INPUT: &str = "Invalid input. Please type 'continue' or 'exit'.";

/// Blocks until the operator types `continue` (true) or `exit` (false).
/// A closed input stream counts as `exit`.
pub fn confirm_to_continue<R: BufRead, W: Write>(mut input: R, mut output: W) -> io::Result<bool> {
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }

        match line.trim().to_lowercase().as_str() {
            "continue" => return Ok(true),
            "exit" => return Ok(false),
            _ => writeln!(output, "{INVALID_INPUT}")?,
        }
    }
}
