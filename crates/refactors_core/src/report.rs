//! Console and log sinks for execution outcomes.

use std::time::Duration;

use log::{info, warn};

use crate::RefactorStep;

#[derive(Clone, Debug, PartialEq)]
pub struct RefactorOutcome {
    pub refactor: String,
    pub step: RefactorStep,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl RefactorOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Human readable line for this outcome.
    pub fn line(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Refactor failed: {} ({}: {error})", self.refactor, self.step);
        }
        let seconds = self.elapsed.as_secs_f64();
        match self.step {
            RefactorStep::BeforeUp => format!("Refactoring: {}", self.refactor),
            RefactorStep::BeforeDown => format!("Refactoring back: {}", self.refactor),
            RefactorStep::Up => format!("Refactored: {} ({seconds:.2} seconds)", self.refactor),
            RefactorStep::Down => {
                format!("Refactored back: {} ({seconds:.2} seconds)", self.refactor)
            }
        }
    }
}

/// Receives outcomes as they happen. Reporting never influences execution.
pub trait RefactorReporter: Send + Sync {
    fn report(&self, outcome: &RefactorOutcome);
}

/// Prints outcome lines to stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleReporter;

impl RefactorReporter for ConsoleReporter {
    fn report(&self, outcome: &RefactorOutcome) {
        if outcome.succeeded() {
            println!("{}", outcome.line());
        } else {
            eprintln!("{}", outcome.line());
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl RefactorReporter for LogReporter {
    fn report(&self, outcome: &RefactorOutcome) {
        if outcome.succeeded() {
            info!("refactors: {}", outcome.line());
        } else {
            warn!("refactors: {}", outcome.line());
        }
    }
}
