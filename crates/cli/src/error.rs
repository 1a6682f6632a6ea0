//! CLI error types.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A module, input or data file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An input or data file is not valid JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unsupported rego version {0}: expected 0 or 1")]
    RegoVersion(u8),

    /// Compilation failed. Diagnostics have already been reported.
    #[error(transparent)]
    Compile(#[from] runtime::CompileFailure),

    /// Evaluation or variable resolution failed.
    #[error("{}: {source}", class_label(.source))]
    Runtime {
        #[from]
        source: runtime::ClassifiedError,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Writing results failed.
    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn class_label(err: &runtime::ClassifiedError) -> &'static str {
    match err.class {
        runtime::ErrorClass::BadRequest => "bad request",
        runtime::ErrorClass::Internal => "internal error",
    }
}

pub type Result<T> = std::result::Result<T, Error>;
