//! Per-task outcome counts.

use serde::Serialize;
use std::fmt;

/// Summary every task returns: how many blocks (or records) came out
/// clean, ambiguous, or failed. `io_errors` counts blocks lost to I/O
/// faults; they are included in `failed` but tracked separately because
/// they decide the process exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub ok: u64,
    pub ambiguous: u64,
    pub failed: u64,
    pub total: u64,
    pub io_errors: u64,
}

impl TaskReport {
    pub fn add_ok(&mut self) {
        self.ok += 1;
        self.total += 1;
    }

    pub fn add_ambiguous(&mut self) {
        self.ambiguous += 1;
        self.total += 1;
    }

    pub fn add_failed(&mut self) {
        self.failed += 1;
        self.total += 1;
    }

    pub fn add_io_error(&mut self) {
        self.io_errors += 1;
        self.add_failed();
    }

    /// Whether the task itself ran cleanly (its findings may still be
    /// bad news).
    #[must_use]
    pub fn ran_clean(&self) -> bool {
        self.io_errors == 0
    }
}

impl fmt::Display for TaskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok {} ambiguous {} failed {} total {}",
            self.ok, self.ambiguous, self.failed, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_into_total() {
        let mut report = TaskReport::default();
        report.add_ok();
        report.add_ambiguous();
        report.add_io_error();
        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 1);
        assert!(!report.ran_clean());
    }
}
