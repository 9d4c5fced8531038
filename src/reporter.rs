//! Diagnostic sink shared by every pipeline pass.
//!
//! Errors are printed to stderr as they are discovered; the flags let the
//! driver decide whether to keep going (skip resolve/interpret after a
//! static error, pick the process exit code in file mode). The REPL resets
//! the flags after every line.

use crate::error::LoxError;

#[derive(Debug, Default)]
pub struct Reporter {
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print the diagnostic and record its class.
    pub fn report(&mut self, error: &LoxError) {
        match error {
            LoxError::Runtime { .. } | LoxError::Io(_) => self.had_runtime_error = true,
            _ => self.had_error = true,
        }

        eprintln!("{}", error);
    }

    /// Any scan/parse/resolve error since the last reset.
    pub fn had_error(&self) -> bool {
        self.had_error
    }

    /// Any runtime error since the last reset.
    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}
