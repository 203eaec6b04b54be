// RAW Writer Errors

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RawError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid axis kind '{0}': first trace needs to be time, frequency, voltage, current or param")]
    InvalidAxisKind(String),

    #[error("Length mismatch for '{name}': expected {expected} points, got {found}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Trace not found: {0}")]
    NotFound(String),

    #[error("Index {index} out of range (length {len})")]
    IndexError { index: usize, len: usize },

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, RawError>;
