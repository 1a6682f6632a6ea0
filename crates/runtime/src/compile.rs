//! The two-stage compile: modules first, then the selection as a query.

use crate::engine::Engine;
use crate::error::CompileError;
use crate::module::{ModuleCompiler, ModuleGraph};
use crate::query::{CompiledQuery, QueryCompiler, QueryContext, parser_options};
use crate::request::{CompilationRequest, Override};
use crate::selection::{Diagnostic, QueryBody, SyntheticNames, parse_selection};
use capability::CapabilitySet;
use serde_json::{Map, Value};
use syntax::{
    Dialect, Error, Errors, Import, Package, ParserOptions, Path, Statement, parse_statements,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Everything needed to evaluate a compiled selection, any number of times.
#[derive(Debug)]
pub struct CompileResult<M> {
    pub query: CompiledQuery,
    /// The selection body before query compilation.
    pub body: QueryBody,
    pub synthetic: SyntheticNames,
    pub graph: ModuleGraph<M>,
    pub package: Option<Package>,
    pub imports: Vec<Import>,
    pub input: Option<Value>,
    pub store: Option<Map<String, Value>>,
}

impl<M> Clone for CompileResult<M> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            body: self.body.clone(),
            synthetic: self.synthetic.clone(),
            graph: self.graph.clone(),
            package: self.package.clone(),
            imports: self.imports.clone(),
            input: self.input.clone(),
            store: self.store.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Compiled<M> {
    pub result: CompileResult<M>,
    pub diagnostics: Vec<Diagnostic>,
}

/// A failed compile, with whatever selection diagnostics were produced
/// before it failed.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct CompileFailure {
    pub error: CompileError,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    pub fn is_parse_error(&self) -> bool {
        self.error.is_parse_error()
    }
}

impl From<CompileError> for CompileFailure {
    fn from(error: CompileError) -> Self {
        Self {
            error,
            diagnostics: Vec::new(),
        }
    }
}

#[instrument(skip_all, fields(modules = request.modules.len(), strict = request.strict))]
pub fn compile<E: Engine>(
    engine: &E,
    request: &CompilationRequest,
    capabilities: &CapabilitySet,
) -> Result<Compiled<E::Modules>, CompileFailure> {
    let dialect = request.dialect();
    let graph = ModuleCompiler::new(engine)
        .with_dialect(dialect)
        .with_strict(request.strict)
        .with_capabilities(capabilities)
        .compile(&request.modules)?;

    let query = if request.query.is_empty() {
        match graph.sole_module() {
            Some(module) => module.package.path.to_string(),
            None => "data".to_string(),
        }
    } else {
        request.query.clone()
    };

    let package = match &request.package {
        Override::Infer => graph.sole_module().map(|m| m.package.clone()),
        Override::Empty => None,
        Override::Set(path) => Some(parse_package(path, dialect)?),
    };
    let imports = match &request.imports {
        Override::Infer => graph
            .sole_module()
            .map(|m| m.imports.clone())
            .unwrap_or_default(),
        Override::Empty => Vec::new(),
        Override::Set(paths) => parse_imports(paths, dialect)?,
    };

    let options = parser_options(dialect, &imports);
    let target = package
        .as_ref()
        .map(|p| p.path.clone())
        .or_else(|| graph.first_module().map(|m| m.package.path.clone()))
        .unwrap_or_else(|| Path::new(["data"]));
    let selection =
        parse_selection(&query, &options, &target).map_err(CompileError::Parse)?;
    debug!(body = %selection.body, diagnostics = selection.diagnostics.len(), "selection parsed");

    let context = QueryContext {
        package: package.clone(),
        imports: imports.clone(),
    };
    let compiled = QueryCompiler::new(&graph, &context, options)
        .with_capabilities(capabilities)
        .compile(&selection.body)
        .map_err(|error| CompileFailure {
            error,
            diagnostics: selection.diagnostics.clone(),
        })?;

    let store = match &request.data {
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            debug!("ignoring data that is not an object");
            None
        }
        None => None,
    };

    Ok(Compiled {
        result: CompileResult {
            query: compiled,
            body: selection.body,
            synthetic: selection.synthetic,
            graph,
            package,
            imports,
            input: request.input.clone(),
            store,
        },
        diagnostics: selection.diagnostics,
    })
}

fn parse_package(path: &str, dialect: Dialect) -> Result<Package, CompileError> {
    let source = format!("package {path}");
    let statements = parse_statements("", &source, &ParserOptions::new(dialect))
        .map_err(CompileError::Parse)?
        .statements;
    match statements.as_slice() {
        [Statement::Package(package)] => Ok(package.clone()),
        _ => Err(CompileError::Parse(
            Error::parse(format!("invalid package {path:?}")).into(),
        )),
    }
}

fn parse_imports(paths: &[String], dialect: Dialect) -> Result<Vec<Import>, CompileError> {
    let source: Vec<String> = paths.iter().map(|p| format!("import {p}")).collect();
    let statements = parse_statements("", &source.join("\n"), &ParserOptions::new(dialect))
        .map_err(CompileError::Parse)?
        .statements;
    let mut imports = Vec::with_capacity(statements.len());
    let mut errors = Errors::new();
    for statement in statements {
        match statement {
            Statement::Import(import) => imports.push(import),
            other => errors.push(
                Error::parse(format!("unexpected {} statement: import expected", other.kind()))
                    .with_location(other.location().clone()),
            ),
        }
    }
    errors.into_result().map_err(CompileError::Parse)?;
    Ok(imports)
}
