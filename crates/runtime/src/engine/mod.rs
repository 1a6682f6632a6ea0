//! Policy engine abstraction.
//!
//! The playground never interprets Rego itself. It hands sources and queries
//! to an [`Engine`] and works with what comes back. [`RegorusEngine`] is the
//! shipped implementation.

mod regorus_engine;
#[cfg(test)]
pub(crate) mod scripted;

pub use regorus_engine::{RegorusEngine, RegorusModules};

use crate::coverage::CoverageReport;
use crate::error::{CompileError, EvalError};
use crate::types::{BuiltinError, PrintRecord, QueryResult, TraceEvent};
use capability::CapabilitySet;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::Instant;
use syntax::Dialect;
use thiserror::Error;

/// A named module source.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSource<'a> {
    pub name: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    pub dialect: Dialect,
    pub strict: bool,
    pub capabilities: &'a CapabilitySet,
}

/// How built-in failures affect evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuiltinErrorMode {
    /// The first failure aborts evaluation.
    #[default]
    Default,
    /// Evaluation runs to completion and every failure is reported.
    CollectAll,
    /// The first failure aborts evaluation, even if collection was asked for.
    Strict,
}

/// Everything the engine needs for one evaluation.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub query: String,
    pub input: Option<Value>,
    pub data: Option<Map<String, Value>>,
    pub trace: bool,
    pub coverage: bool,
    pub builtin_errors: BuiltinErrorMode,
    /// Value returned by `opa.runtime()`.
    pub runtime: Value,
    /// Seed for `rand.intn`.
    pub seed: u64,
    /// Value returned by `time.now_ns()`.
    pub now: DateTime<Utc>,
    /// Work still running past this instant is abandoned.
    pub deadline: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub results: Vec<QueryResult>,
    /// Failures collected under [`BuiltinErrorMode::CollectAll`].
    pub builtin_errors: Vec<BuiltinError>,
    pub trace: Vec<TraceEvent>,
    pub coverage: Option<CoverageReport>,
    pub prints: Vec<PrintRecord>,
}

/// Failures reported by an engine while evaluating.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("{0}")]
    Builtin(BuiltinError),

    #[error("{0}")]
    Eval(String),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl From<EngineError> for EvalError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Builtin(err) => EvalError::Builtin(err),
            EngineError::Eval(msg) => EvalError::Eval(msg),
            EngineError::Cancelled => EvalError::Cancelled,
            EngineError::Internal(msg) => EvalError::Internal(msg),
        }
    }
}

/// Trait for policy engines.
///
/// `compile` validates a module set as one unit and returns whatever handle
/// the engine needs later. `evaluate` is synchronous and may block; callers
/// run it on a blocking thread.
///
/// The caller stops waiting at `EvalRequest::deadline`, but cannot stop the
/// thread. Implementations check the deadline wherever they get control and
/// return [`EngineError::Cancelled`] once it has passed; work they cannot
/// interrupt runs on until it finishes and its result is dropped.
pub trait Engine: Send + Sync + 'static {
    type Modules: Send + Sync + 'static;

    fn compile(
        &self,
        modules: &[ModuleSource<'_>],
        options: CompileOptions<'_>,
    ) -> Result<Self::Modules, CompileError>;

    fn evaluate(
        &self,
        modules: &Self::Modules,
        request: EvalRequest,
    ) -> Result<EngineOutput, EngineError>;
}
