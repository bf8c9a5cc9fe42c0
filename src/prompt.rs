//! Operator confirmation prompts.
//!
//! Orchestration code never talks to the terminal directly: it asks a
//! [`Prompter`] and tests supply a scripted implementation instead.

use std::io::{self, IsTerminal, Write};

/// A single yes/no question put to the operator.
pub trait Prompter {
    /// Ask a yes/no question, returning `default` on an empty answer.
    fn confirm(&self, question: &str, default: bool) -> io::Result<bool>;

    /// Whether a real operator is attached to answer questions.
    fn is_interactive(&self) -> bool;
}

/// Prompter reading answers from the controlling terminal.
pub struct TtyPrompter;

impl Prompter for TtyPrompter {
    fn confirm(&self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };

        loop {
            print!("❓ {} [{}]: ", question, hint);
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            let input = input.trim().to_lowercase();

            if input.is_empty() {
                return Ok(default);
            }

            match input.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {
                    println!("❌ Please enter 'y' or 'n'.");
                    continue;
                }
            }
        }
    }

    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stdout().is_terminal()
    }
}
