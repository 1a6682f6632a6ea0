//! Compilation requests.

use serde_json::Value;
use std::collections::BTreeMap;
use syntax::Dialect;

/// A three-state override: infer a value, force none, or use the given one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Override<T> {
    /// Infer from the sole module, if there is exactly one.
    #[default]
    Infer,
    /// Explicitly none.
    Empty,
    Set(T),
}

impl<T> From<Option<T>> for Override<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Override::Set(value),
            None => Override::Infer,
        }
    }
}

/// Modules plus a selection to turn into a query.
#[derive(Debug, Clone, Default)]
pub struct CompilationRequest {
    pub modules: BTreeMap<String, String>,
    pub input: Option<Value>,
    /// Seed data. Kept only when it is a JSON object.
    pub data: Option<Value>,
    pub query: String,
    pub package: Override<String>,
    pub imports: Override<Vec<String>>,
    pub strict: bool,
    /// `None` compiles under the default dialect.
    pub dialect: Option<Dialect>,
}

impl CompilationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_module(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.modules.insert(name.into(), source.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_package(mut self, package: Override<String>) -> Self {
        self.package = package;
        self
    }

    pub fn with_imports(mut self, imports: Override<Vec<String>>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or_default()
    }
}
