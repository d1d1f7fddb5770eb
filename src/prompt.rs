//! Operator confirmation.
//!
//! Restricted actions on NationStates must be triggered by the person
//! running the script. The runner asks a `Confirm` before each one; the
//! interactive implementation reads `y`/`n` from stdin, while `--yes`
//! swaps in `AutoConfirm` for operators who accept every step up front.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use tracing::debug;

/// Source of yes/no decisions for the runner.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Ask a yes/no question.
    async fn confirm(&self, question: &str) -> Result<bool>;

    /// Show a message and wait until the operator acknowledges it.
    async fn pause(&self, message: &str) -> Result<()>;
}

/// Interpret an answer. `None` means the question should be asked again.
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" => Some(true),
        "n" => Some(false),
        _ => None,
    }
}

/// Asks on stdout and reads answers from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl StdinConfirm {
    fn read_line(prompt: &str) -> Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{prompt}").context("Failed to write prompt")?;
        stdout.flush().context("Failed to flush prompt")?;

        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            anyhow::bail!("stdin closed while waiting for an answer");
        }
        Ok(line)
    }
}

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            loop {
                let line = Self::read_line(&format!("{question} (y/n): "))?;
                match parse_answer(&line) {
                    Some(true) => return Ok(true),
                    Some(false) => {
                        println!("Skipping operation.");
                        return Ok(false);
                    }
                    None => println!("Invalid input, please respond with 'y' or 'n'."),
                }
            }
        })
        .await
        .context("Prompt task panicked")?
    }

    async fn pause(&self, message: &str) -> Result<()> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            Self::read_line(&format!("{message} ")).map(|_| ())
        })
        .await
        .context("Prompt task panicked")?
    }
}

/// Answers yes to everything and never waits.
#[derive(Debug, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        debug!(question, "Auto-confirmed");
        Ok(true)
    }

    async fn pause(&self, message: &str) -> Result<()> {
        debug!(message, "Auto-acknowledged");
        Ok(())
    }
}
