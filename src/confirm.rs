/// User confirmation before mutating the cluster
use std::io::{self, BufRead, Write};

/// Asks whether a step should go ahead
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

/// Prompts on the terminal, or approves everything with `--yes`
pub struct TerminalPrompt {
    auto_approve: bool,
}

impl TerminalPrompt {
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }
}

impl Confirm for TerminalPrompt {
    fn confirm(&self, message: &str) -> bool {
        if self.auto_approve {
            return true;
        }

        print!("{} [y/N]: ", message);
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut input = String::new();
        match io::stdin().lock().read_line(&mut input) {
            Ok(_) => is_yes(&input),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
