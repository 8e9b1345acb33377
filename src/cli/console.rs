//! Terminal-facing progress and confirmation
//!
//! SBIO: I/O wrappers over the pure formatters in `display`

use std::io::{self, BufRead, Write};

use super::display::{format_confirm_prompt, format_detail, format_stage, format_warning};
use crate::orchestrator::{Confirm, Progress, Stage};

/// Prints progress lines to stdout, warnings to stderr
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn stage(&self, stage: Stage) {
        println!("{}", format_stage(stage));
    }

    fn detail(&self, message: &str) {
        println!("{}", format_detail(message));
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", format_warning(message));
    }
}

/// Asks on stdin unless `assume_yes` is set
#[derive(Debug, Default)]
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl StdinConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> io::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        let mut stdout = io::stdout();
        write!(stdout, "{}", format_confirm_prompt(question))?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(parse_answer(&answer))
    }
}

/// Only an explicit yes counts; empty input takes the default, no
pub fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
