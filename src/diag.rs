//! Run-wide diagnostics sink.
//!
//! Recoverable failures (a declaration that cannot compile or render, an
//! annotation that fails to parse) are warnings: printed as they happen and
//! collected so tests can assert on them without capturing stderr. Fatal
//! failures travel as errors instead and never pass through here.

use std::cell::RefCell;

use colored::Colorize;

#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: RefCell<Vec<String>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        eprintln!("{} {message}", "warning:".yellow().bold());
        self.warnings.borrow_mut().push(message);
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.borrow().len()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}
