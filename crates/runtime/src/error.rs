//! Error types and classification.
//!
//! Every failure leaving the playground is one of [`CompileError`] or
//! [`EvalError`]. Evaluation failures are additionally tagged with an
//! [`ErrorClass`] so callers can tell their own mistakes from ours.

use crate::types::BuiltinError;
use serde::Serialize;
use std::time::Duration;
use syntax::Errors;
use thiserror::Error;

/// A module or query failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The text could not be parsed. Nothing past parsing ran.
    #[error("{0}")]
    Parse(Errors),

    /// Parsing succeeded but a later compile stage rejected the input.
    #[error("{0}")]
    Compile(Errors),
}

impl CompileError {
    /// Whether the failure happened before any compile-stage check, which
    /// makes it eligible for a retry under an older dialect.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, CompileError::Parse(_))
    }

    pub fn errors(&self) -> &Errors {
        match self {
            CompileError::Parse(errors) | CompileError::Compile(errors) => errors,
        }
    }
}

/// Evaluation failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// A built-in failed and evaluation stopped there.
    #[error("{0}")]
    Builtin(BuiltinError),

    /// Every built-in failure seen while evaluating to completion.
    #[error("{}", render_builtin_errors(.0))]
    BuiltinErrors(Vec<BuiltinError>),

    /// The engine rejected the query or policy while evaluating it.
    #[error("{0}")]
    Eval(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("evaluation exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The engine aborted abruptly.
    #[error("evaluation aborted: {0}")]
    Panic(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn render_builtin_errors(errors: &[BuiltinError]) -> String {
    match errors {
        [only] => format!("1 error occurred: {only}"),
        all => {
            let lines: Vec<String> = all.iter().map(ToString::to_string).collect();
            format!("{} errors occurred:\n{}", all.len(), lines.join("\n"))
        }
    }
}

/// Any playground failure.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The request was wrong: bad syntax, unsafe calls, failing built-ins.
    BadRequest,
    /// The playground failed: deadline, cancellation, engine faults.
    Internal,
}

/// An error tagged with its [`ErrorClass`].
#[derive(Debug, Clone, Error)]
#[error("{source}")]
pub struct ClassifiedError {
    pub class: ErrorClass,
    pub source: Error,
}

impl ClassifiedError {
    pub fn is_internal(&self) -> bool {
        self.class == ErrorClass::Internal
    }

    pub fn is_bad_request(&self) -> bool {
        self.class == ErrorClass::BadRequest
    }
}

impl From<Error> for ClassifiedError {
    fn from(source: Error) -> Self {
        let class = match &source {
            Error::Compile(_) => ErrorClass::BadRequest,
            Error::Eval(err) => match err {
                EvalError::Builtin(_) | EvalError::BuiltinErrors(_) | EvalError::Eval(_) => {
                    ErrorClass::BadRequest
                }
                EvalError::Cancelled
                | EvalError::DeadlineExceeded(_)
                | EvalError::Panic(_)
                | EvalError::Internal(_) => ErrorClass::Internal,
            },
        };
        Self { class, source }
    }
}

impl From<CompileError> for ClassifiedError {
    fn from(err: CompileError) -> Self {
        Error::from(err).into()
    }
}

impl From<EvalError> for ClassifiedError {
    fn from(err: EvalError) -> Self {
        Error::from(err).into()
    }
}

/// Tag an error with its class.
pub fn classify(error: impl Into<Error>) -> ClassifiedError {
    error.into().into()
}
