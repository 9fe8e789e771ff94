#![forbid(unsafe_code)]
//! The BitMend task engines.
//!
//! Each public function is one pass of the toolkit's pipeline:
//!
//! ```text
//! data + checksum sidecar ─ verify ─► mismatch list
//!                  mismatch list ─ repair ─► repair instructions
//! instructions + backup + sidecar ─ restore ─► restore instructions
//!                    instructions ─ execute ─► mutated data file
//! ```
//!
//! Every intermediate artifact is a persisted sidecar file; every task is
//! a single sequential scan that owns its file handles and emits records
//! in strictly ascending block order. Per-block failures are counted and
//! logged, never allowed to poison the rest of the pass.

mod calibrate;
mod classify;
mod device;
mod diagnose;
mod execute;
mod generate;
mod profile;
mod repair;
mod report;
mod restore;
mod sink;
mod verify;

pub use calibrate::Calibration;
pub use device::BlockFile;
pub use diagnose::{diagnose, DiagnoseInputs};
pub use execute::execute;
pub use generate::generate;
pub use profile::{Budgets, SearchOptions};
pub use repair::repair;
pub use report::TaskReport;
pub use restore::{restore, RestoreInputs, RestoreMode};
pub use verify::verify;
