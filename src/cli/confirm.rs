//! Interactive overwrite confirmation

use crate::export::Confirm;
use std::io::{BufRead, Write};

/// Asks on stderr and reads the answer from stdin; only `y` / `yes` agree
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = std::io::stderr();
        if write!(stderr, "{prompt} (y/n): ").and_then(|_| stderr.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
