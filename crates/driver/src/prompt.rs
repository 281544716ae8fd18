//! Operator confirmation before a backfill
use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use eyre::{Result, WrapErr};

/// Asks the operator a yes/no question
#[async_trait]
pub trait Confirm: Send + Sync + std::fmt::Debug {
    /// `true` when the operator agreed
    async fn confirm(&self, question: &str) -> Result<bool>;
}

/// Prompts on stdout and reads one line from stdin. End of input declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        let question = question.to_owned();
        tokio::task::spawn_blocking(move || -> io::Result<bool> {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{question} ")?;
            stdout.flush()?;

            let mut answer = String::new();
            let read = io::stdin().lock().read_line(&mut answer)?;
            Ok(read > 0 && is_affirmative(&answer))
        })
        .await
        .wrap_err("Confirmation prompt task failed")?
        .wrap_err("Failed to read confirmation from stdin")
    }
}

/// Agrees without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

#[async_trait]
impl Confirm for AssumeYes {
    async fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(true)
    }
}

/// `y` or `yes`, case-insensitive, surrounding whitespace ignored
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_yes_variants() {
        for answer in ["y", "Y", "yes", "YES", " Yes\n", "yes\r\n"] {
            assert!(is_affirmative(answer), "{answer:?} should confirm");
        }
    }

    #[test]
    fn everything_else_declines() {
        for answer in ["", "\n", "n", "no", "yep", "yes please", "1"] {
            assert!(!is_affirmative(answer), "{answer:?} should decline");
        }
    }

    #[tokio::test]
    async fn assume_yes_always_confirms() {
        assert!(AssumeYes.confirm("Backfill?").await.unwrap());
    }
}
