//! regoplay runtime: compile and evaluate policy selections.
//!
//! This crate turns a set of policy modules plus a caller's selection into a
//! safety-checked query, runs it under a deadline, and classifies whatever
//! goes wrong.
//!
//! # Overview
//!
//! - **Engine**: a trait over the interpreter that does the real work.
//!   [`RegorusEngine`] is the shipped implementation.
//! - **ModuleCompiler**: outlines modules, hands them to the engine, then
//!   runs the safety, capability and strict checks.
//! - **Selection**: a highlighted fragment turned into a query body, with
//!   diagnostics for the parts that cannot be evaluated.
//! - **QueryCompiler**: resolves names, rewrites locals, checks safety.
//! - **Playground**: the facade tying these together.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{CompilationRequest, EvalOptions, Playground};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let playground = Playground::regorus();
//! let request = CompilationRequest::new("hello")
//!     .with_module("play.rego", "package play\n\nhello if input.message == \"world\"")
//!     .with_input(serde_json::json!({"message": "world"}));
//!
//! let compiled = playground.compile(&request)?;
//! let result = playground.evaluate(&compiled.result, EvalOptions::default()).await?;
//! println!("{}", serde_json::to_string_pretty(&result.results)?);
//! # Ok(())
//! # }
//! ```

mod compile;
mod coverage;
mod engine;
mod error;
mod eval;
mod module;
mod playground;
mod project;
mod query;
mod request;
mod selection;
mod strict;
mod types;
mod vars;

pub use capability::{CapabilitySet, capabilities};

pub use compile::{CompileFailure, CompileResult, Compiled, compile};
pub use coverage::{CoverageReport, FileCoverage, LineRange, Row};
pub use engine::{
    BuiltinErrorMode, CompileOptions, Engine, EngineError, EngineOutput, EvalRequest,
    ModuleSource, RegorusEngine, RegorusModules,
};
pub use error::{
    ClassifiedError, CompileError, Error, ErrorClass, EvalError, Result, classify,
};
pub use eval::{DEFAULT_DEADLINE, EvalOptions, EvalResult, RUNTIME_DISCLAIMER, evaluate};
pub use module::{ModuleCompiler, ModuleGraph};
pub use playground::{EvalConfig, Playground};
pub use project::project;
pub use query::{CompiledQuery, QueryCompiler, QueryContext, QueryStage, parser_options};
pub use request::{CompilationRequest, Override};
pub use selection::{
    Diagnostic, QueryBody, SELECTION_FILE, Selection, SyntheticNames, parse_selection,
};
pub use types::{BuiltinError, ExpressionValue, PrintRecord, QueryResult, TraceEvent, TraceOp};
pub use vars::resolve_vars;
