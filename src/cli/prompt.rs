//! Interactive terminal prompts.

use anyhow::{Result, bail};
use std::io::{self, BufRead, Write};

/// Ask a yes/no question. Only an explicit `y`/`yes` confirms.
pub fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let answer = read_line(&mut io::stdin().lock())?;
    Ok(is_yes(&answer))
}

/// Ask for a free-form value; empty answers are rejected.
pub fn ask(question: &str) -> Result<String> {
    eprint!("{question}: ");
    io::stderr().flush()?;
    let answer = read_line(&mut io::stdin().lock())?;
    if answer.is_empty() {
        bail!("no value entered");
    }
    Ok(answer)
}

fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.to_lowercase().as_str(), "y" | "yes")
}
