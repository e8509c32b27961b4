//! Line-oriented prompt helpers.
//!
//! Generic over reader and writer so interactive steps can be driven from
//! tests with in-memory buffers.

use std::io::{self, BufRead, Write};

/// Print a prompt and read one trimmed line.
pub fn prompt_line<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<String> {
    write!(output, "{question}")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before an answer was given",
        ));
    }
    Ok(line.trim().to_string())
}

/// Prompt until the answer is non-empty.
pub fn prompt_required<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<String> {
    loop {
        let answer = prompt_line(question, input, output)?;
        if !answer.is_empty() {
            return Ok(answer);
        }
        writeln!(output, "A value is required.")?;
    }
}

/// Ask a yes/no question. Anything starting with 'y' or 'Y' is a yes.
pub fn confirm<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> io::Result<bool> {
    let answer = prompt_line(question, input, output)?;
    Ok(answer.to_ascii_lowercase().starts_with('y'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_line_trims_whitespace() {
        let mut input = Cursor::new("  hello world  \n");
        let mut output = Vec::new();
        let answer = prompt_line("Q: ", &mut input, &mut output).unwrap();
        assert_eq!(answer, "hello world");
        assert_eq!(String::from_utf8(output).unwrap(), "Q: ");
    }

    #[test]
    fn test_prompt_required_reprompts_on_empty() {
        let mut input = Cursor::new("\n\nvalue\n");
        let mut output = Vec::new();
        let answer = prompt_required("id: ", &mut input, &mut output).unwrap();
        assert_eq!(answer, "value");
        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("id: ").count(), 3);
    }

    #[test]
    fn test_prompt_line_errors_on_closed_input() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        let err = prompt_line("Q: ", &mut input, &mut output).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_confirm_accepts_yes_variants() {
        for answer in ["y\n", "Y\n", "yes\n", "Yep\n"] {
            let mut input = Cursor::new(answer);
            let mut output = Vec::new();
            assert!(confirm("? ", &mut input, &mut output).unwrap());
        }
        for answer in ["n\n", "no\n", "\n", "maybe\n"] {
            let mut input = Cursor::new(answer);
            let mut output = Vec::new();
            assert!(!confirm("? ", &mut input, &mut output).unwrap());
        }
    }
}
