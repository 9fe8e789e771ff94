#![forbid(unsafe_code)]
//! Error types for BitMend.
//!
//! Defines `BmdError` and a `Result<T>` alias used throughout the
//! workspace.

use thiserror::Error;

/// Unified error type for all BitMend operations.
#[derive(Debug, Error)]
pub enum BmdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unresolvable sidecar header: {0}")]
    Header(String),

    #[error("malformed sidecar: {0}")]
    Format(String),

    #[error("invalid geometry: {0}")]
    Geometry(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Parse(#[from] bmd_types::ParseError),
}

/// Result alias using `BmdError`.
pub type Result<T> = std::result::Result<T, BmdError>;
