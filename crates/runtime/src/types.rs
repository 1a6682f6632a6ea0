//! Values exchanged with the engine and returned to callers.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use syntax::{Location, Position};

/// One solution of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub expressions: Vec<ExpressionValue>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub bindings: Map<String, Value>,
}

impl QueryResult {
    pub fn with_binding(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_expression(mut self, text: impl Into<String>, value: Value) -> Self {
        self.expressions.push(ExpressionValue {
            value,
            text: text.into(),
            location: None,
        });
        self
    }
}

/// The value of one query expression within a solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionValue {
    pub value: Value,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
}

/// A built-in function failure raised while evaluating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltinError {
    /// The failing built-in, e.g. `div`.
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl fmt::Display for BuiltinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "eval_builtin_error: {}: {}", self.name, self.message)
    }
}

impl std::error::Error for BuiltinError {}

/// Output of one `print` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub message: String,
}

impl fmt::Display for PrintRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceOp {
    Enter,
    Eval,
    Exit,
    Redo,
    Fail,
    Note,
}

/// One step of an evaluation trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent {
    pub op: TraceOp,
    pub depth: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
}

impl TraceEvent {
    pub fn new(op: TraceOp, depth: usize, message: impl Into<String>) -> Self {
        Self {
            op,
            depth,
            message: message.into(),
            location: None,
        }
    }
}
