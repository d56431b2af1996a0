//! Yes/no prompts on the terminal.

use std::io::{self, BufRead, Write};

/// Prints `question` and reads one line of answer.
///
/// Only `y` (after trimming, any case) counts as yes. End of input is a no.
///
/// # Errors
///
/// Returns error if writing the question or reading the answer fails.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{question}")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
