//! Query compilation.
//!
//! A query body passes through a fixed list of stages. Callers may stop
//! after any of them to inspect the intermediate body; stopping is reported
//! separately from failure so the two are never confused.

use crate::error::CompileError;
use crate::module::ModuleGraph;
use crate::selection::QueryBody;
use capability::{CapabilitySet, SafetyGuard, Scope, capabilities, undefined_calls};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use syntax::{Dialect, Error, Errors, Expr, Import, Package, ParserOptions, is_ref_head};
use tracing::debug;

/// Package and imports a query is compiled against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub package: Option<Package>,
    pub imports: Vec<Import>,
}

/// Parser options implied by a query's imports. Only `future.keywords`,
/// `future.keywords.in` and `rego.v1` have an effect.
pub fn parser_options(dialect: Dialect, imports: &[Import]) -> ParserOptions {
    let mut options = ParserOptions::new(dialect);
    for import in imports {
        if import.path.matches(&["future", "keywords"]) {
            options = options.with_all_future_keywords();
        } else if import.path.matches(&["future", "keywords", "in"]) {
            options = options.with_future_keyword("in");
        } else if import.path.matches(&["rego", "v1"]) {
            options = options.with_dialect(Dialect::V1);
        }
    }
    options
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryStage {
    CheckEmpty,
    ResolveRefs,
    RewriteLocals,
    CheckSafety,
    CheckCapabilities,
}

impl QueryStage {
    pub const ALL: [QueryStage; 5] = [
        QueryStage::CheckEmpty,
        QueryStage::ResolveRefs,
        QueryStage::RewriteLocals,
        QueryStage::CheckSafety,
        QueryStage::CheckCapabilities,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueryStage::CheckEmpty => "CheckEmpty",
            QueryStage::ResolveRefs => "ResolveRefs",
            QueryStage::RewriteLocals => "RewriteLocals",
            QueryStage::CheckSafety => "CheckSafety",
            QueryStage::CheckCapabilities => "CheckCapabilities",
        }
    }
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A query after compilation, or after the stage it was stopped at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    pub body: QueryBody,
    /// Rewritten local name to the name written in the query.
    pub rewritten_vars: BTreeMap<String, String>,
}

impl CompiledQuery {
    pub fn text(&self) -> String {
        self.body.to_string()
    }
}

/// Why [`QueryCompiler::run`] returned early.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// The requested stop stage finished.
    Stop(CompiledQuery),
    Failed(CompileError),
}

impl From<CompileError> for Interrupt {
    fn from(err: CompileError) -> Self {
        Interrupt::Failed(err)
    }
}

pub struct QueryCompiler<'a, M> {
    graph: &'a ModuleGraph<M>,
    context: &'a QueryContext,
    options: ParserOptions,
    capabilities: &'a CapabilitySet,
    stop_after: Option<QueryStage>,
}

impl<'a, M> QueryCompiler<'a, M> {
    pub fn new(graph: &'a ModuleGraph<M>, context: &'a QueryContext, options: ParserOptions) -> Self {
        Self {
            graph,
            context,
            options,
            capabilities: capabilities(),
            stop_after: None,
        }
    }

    pub fn with_stop_after(mut self, stage: QueryStage) -> Self {
        self.stop_after = Some(stage);
        self
    }

    pub fn with_capabilities(mut self, capabilities: &'a CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Compile `body`. A configured stop stage ends compilation early with
    /// the body as it was after that stage.
    pub fn compile(&self, body: &QueryBody) -> Result<CompiledQuery, CompileError> {
        match self.run(body) {
            Ok(query) | Err(Interrupt::Stop(query)) => Ok(query),
            Err(Interrupt::Failed(err)) => Err(err),
        }
    }

    pub(crate) fn run(&self, body: &QueryBody) -> Result<CompiledQuery, Interrupt> {
        let mut query = CompiledQuery {
            body: body.clone(),
            rewritten_vars: BTreeMap::new(),
        };
        for stage in QueryStage::ALL {
            match stage {
                QueryStage::CheckEmpty => self.check_empty(&query)?,
                QueryStage::ResolveRefs => query = self.resolve_refs(query)?,
                QueryStage::RewriteLocals => query = self.rewrite_locals(query)?,
                QueryStage::CheckSafety => self.check_safety(&query)?,
                QueryStage::CheckCapabilities => self.check_capabilities(&query)?,
            }
            debug!(%stage, query = %query.body, "query stage done");
            if self.stop_after == Some(stage) {
                return Err(Interrupt::Stop(query));
            }
        }
        Ok(query)
    }

    fn check_empty(&self, query: &CompiledQuery) -> Result<(), CompileError> {
        if query.body.is_empty() {
            return Err(CompileError::Parse(
                Error::compile("empty query cannot be compiled").into(),
            ));
        }
        Ok(())
    }

    fn resolve_refs(&self, query: CompiledQuery) -> Result<CompiledQuery, CompileError> {
        let declared: BTreeSet<String> = declared_locals(&query.body, &self.options)
            .into_iter()
            .collect();
        let mut targets: BTreeMap<String, String> = BTreeMap::new();
        if let Some(package) = &self.context.package {
            for rule in self.graph.rules_in(&package.path) {
                targets.insert(rule.name.clone(), package.path.child(&rule.name).to_string());
            }
        }
        for import in self.context.imports.iter().filter(|i| !i.is_keyword_import()) {
            targets.insert(import.local_name().to_string(), import.path.to_string());
        }

        self.rewrite_heads(query, |name| {
            if declared.contains(name) || matches!(name, "input" | "data") {
                return None;
            }
            targets.get(name).cloned()
        })
    }

    fn rewrite_locals(&self, query: CompiledQuery) -> Result<CompiledQuery, CompileError> {
        let mut renames: BTreeMap<String, String> = BTreeMap::new();
        for name in declared_locals(&query.body, &self.options) {
            let local = format!("__local{}__", renames.len());
            renames.insert(name, local);
        }
        let mut query = self.rewrite_heads(query, |name| renames.get(name).cloned())?;
        query.rewritten_vars = renames.into_iter().map(|(k, v)| (v, k)).collect();
        Ok(query)
    }

    fn check_safety(&self, query: &CompiledQuery) -> Result<(), CompileError> {
        let locals = BTreeSet::new();
        let scope = Scope::new(&self.options, &locals);
        let errors: Errors = query
            .body
            .exprs
            .iter()
            .flat_map(|expr| {
                SafetyGuard::check(&expr.tokens, scope)
                    .into_iter()
                    .map(|v| v.to_error(&expr.location.file))
            })
            .collect();
        errors.into_result().map_err(CompileError::Compile)
    }

    fn check_capabilities(&self, query: &CompiledQuery) -> Result<(), CompileError> {
        let locals = BTreeSet::new();
        let scope = Scope::new(&self.options, &locals);
        let errors: Errors = query
            .body
            .exprs
            .iter()
            .flat_map(|expr| {
                undefined_calls(&expr.tokens, scope, self.capabilities)
                    .into_iter()
                    .map(|v| v.to_error(&expr.location.file))
            })
            .collect();
        errors.into_result().map_err(CompileError::Compile)
    }

    /// Replace every reference head for which `replace` returns a name.
    fn rewrite_heads<F>(&self, query: CompiledQuery, replace: F) -> Result<CompiledQuery, CompileError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut exprs = Vec::with_capacity(query.body.exprs.len());
        let mut errors = Errors::new();
        for expr in &query.body.exprs {
            let edits: Vec<(Range<usize>, String)> = (0..expr.tokens.len())
                .filter(|&i| is_ref_head(&expr.tokens, i, &self.options))
                .filter_map(|i| {
                    let token = &expr.tokens[i];
                    replace(&token.text).map(|name| (token.span.clone(), name))
                })
                .collect();
            match expr.rewrite(edits) {
                Ok(expr) => exprs.push(expr),
                Err(err) => errors.push(err),
            }
        }
        errors.into_result().map_err(CompileError::Parse)?;
        Ok(CompiledQuery {
            body: QueryBody { exprs },
            rewritten_vars: query.rewritten_vars,
        })
    }
}

/// Names the query declares, in order of first declaration: `:=` targets
/// and variables introduced by `some` or `every`.
fn declared_locals(body: &QueryBody, options: &ParserOptions) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for expr in &body.exprs {
        for name in expr_locals(expr, options) {
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }
    names
}

fn expr_locals(expr: &Expr, options: &ParserOptions) -> Vec<String> {
    let tokens = &expr.tokens;
    let mut names = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let declares = tok.is_keyword("some", options) || tok.is_keyword("every", options);
        if declares {
            let mut j = i + 1;
            while let Some(name) = tokens.get(j).filter(|t| t.is_name(options)) {
                names.push(name.text.clone());
                if !tokens.get(j + 1).is_some_and(|t| t.is_punct(",")) {
                    break;
                }
                j += 2;
            }
        } else if tok.is_name(options)
            && is_ref_head(tokens, i, options)
            && tokens.get(i + 1).is_some_and(|t| t.is_punct(":="))
        {
            names.push(tok.text.clone());
        }
    }
    names.retain(|n| n != "_");
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::ScriptedEngine;
    use crate::module::ModuleCompiler;
    use crate::selection::{SELECTION_FILE, parse_selection};
    use syntax::Path;

    const POLICY: &str = "package play\n\nimport input.message\n\nhello if message == \"world\"\n\nf(x) := x";

    fn graph() -> ModuleGraph<Vec<String>> {
        let engine = ScriptedEngine::new();
        let modules = [("play.rego".to_string(), POLICY.to_string())].into();
        ModuleCompiler::new(&engine).compile(&modules).unwrap()
    }

    fn context(graph: &ModuleGraph<Vec<String>>) -> QueryContext {
        let module = graph.sole_module().unwrap();
        QueryContext {
            package: Some(module.package.clone()),
            imports: module.imports.clone(),
        }
    }

    fn body(text: &str) -> QueryBody {
        let package = Path::new(["data", "play"]);
        parse_selection(text, &ParserOptions::default(), &package)
            .unwrap()
            .body
    }

    #[test]
    fn test_empty_query_fails_at_parse_stage() {
        let graph = graph();
        let ctx = context(&graph);
        let err = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&QueryBody::default())
            .unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(
            err.to_string(),
            "1 error occurred: rego_compile_error: empty query cannot be compiled"
        );
    }

    #[test]
    fn test_rule_and_import_names_resolve() {
        let graph = graph();
        let ctx = context(&graph);
        let query = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body("hello; message == \"x\"; f(1)"))
            .unwrap();
        assert_eq!(
            query.text(),
            "data.play.hello; input.message == \"x\"; data.play.f(1)"
        );
    }

    #[test]
    fn test_locals_are_rewritten_and_recorded() {
        let graph = graph();
        let ctx = context(&graph);
        let query = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body("x := 1; some y in [x]; hello := y"))
            .unwrap();
        assert_eq!(
            query.text(),
            "__local0__ := 1; some __local1__ in [__local0__]; __local2__ := __local1__"
        );
        assert_eq!(query.rewritten_vars["__local2__"], "hello");
        assert_eq!(query.rewritten_vars.len(), 3);
    }

    #[test]
    fn test_stop_after_is_not_failure() {
        let graph = graph();
        let ctx = context(&graph);
        let compiler = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .with_stop_after(QueryStage::ResolveRefs);
        let outcome = compiler.run(&body("x := hello"));
        let Err(Interrupt::Stop(query)) = outcome else {
            panic!("expected stop, got {outcome:?}");
        };
        assert_eq!(query.text(), "x := data.play.hello");
        assert!(query.rewritten_vars.is_empty());
    }

    #[test]
    fn test_unsafe_query_is_type_error() {
        let graph = graph();
        let ctx = QueryContext::default();
        let err = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body(
                "is_object({\"method\": \"get\"}) with is_object as http.send",
            ))
            .unwrap_err();
        assert!(!err.is_parse_error());
        assert_eq!(
            err.to_string(),
            format!(
                "1 error occurred: {SELECTION_FILE}:1: rego_type_error: unsafe built-in function calls in expression: http.send"
            )
        );
    }

    #[test]
    fn test_bracket_call_in_query_is_unsafe() {
        let graph = graph();
        let ctx = QueryContext::default();
        let err = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body("x := net[\"lookup_ip_addr\"](\"example.com\")"))
            .unwrap_err();
        assert_eq!(
            err.errors().first().unwrap().message,
            "unsafe built-in function calls in expression: net.lookup_ip_addr"
        );
    }

    #[test]
    fn test_undefined_function_in_query() {
        let graph = graph();
        let ctx = QueryContext::default();
        let err = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body("nope(1)"))
            .unwrap_err();
        assert_eq!(err.errors().first().unwrap().message, "undefined function nope");
    }

    #[test]
    fn test_without_context_names_stay_unresolved() {
        let graph = graph();
        let ctx = QueryContext::default();
        let query = QueryCompiler::new(&graph, &ctx, ParserOptions::default())
            .compile(&body("data.play.hello == true"))
            .unwrap();
        assert_eq!(query.text(), "data.play.hello == true");
    }

    #[test]
    fn test_parser_options_from_imports() {
        let imports = |src: &str| -> Vec<Import> {
            syntax::outline("q", src, &ParserOptions::default())
                .unwrap()
                .statements
                .into_iter()
                .filter_map(|s| match s {
                    syntax::Statement::Import(i) => Some(i),
                    _ => None,
                })
                .collect()
        };
        let opts = parser_options(Dialect::V0, &imports("import future.keywords.in"));
        assert!(opts.is_keyword("in"));
        assert!(!opts.is_keyword("if"));
        let opts = parser_options(Dialect::V0, &imports("import future.keywords"));
        assert!(opts.is_keyword("every"));
        let opts = parser_options(Dialect::V0, &imports("import rego.v1"));
        assert_eq!(opts.dialect, Dialect::V1);
        let opts = parser_options(Dialect::V0, &imports("import future.keywords.if"));
        assert!(!opts.is_keyword("if"));
    }
}
