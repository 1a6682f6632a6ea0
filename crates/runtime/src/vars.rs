//! Variables a selection binds, as written by the user.

use crate::engine::Engine;
use crate::error::CompileError;
use crate::module::ModuleCompiler;
use crate::query::{CompiledQuery, Interrupt, QueryCompiler, QueryContext, QueryStage};
use crate::selection::{QueryBody, SELECTION_FILE};
use std::collections::{BTreeMap, BTreeSet};
use syntax::{Dialect, Error, ParserOptions, Statement, is_ref_head, parse_statements};

/// Module name the policy is compiled under.
const POLICY_FILE: &str = "policy.rego";

/// Compile `module`, compile `selection` against its package up to local
/// rewriting, and list the variables of the result. Reference heads, call
/// heads, wildcards and the `input`/`data` roots are not variables.
pub fn resolve_vars<E: Engine>(
    engine: &E,
    module: &str,
    selection: &str,
    dialect: Dialect,
) -> Result<Vec<String>, CompileError> {
    let options = ParserOptions::new(dialect);
    let outline =
        parse_statements(SELECTION_FILE, selection, &options).map_err(CompileError::Parse)?;
    let mut exprs = Vec::new();
    for statement in outline.statements {
        match statement {
            Statement::Body(body) => exprs.extend(body.exprs),
            other => {
                return Err(CompileError::Parse(
                    Error::parse(format!("expected query body, found {}", other.kind()))
                        .with_location(other.location().clone())
                        .into(),
                ));
            }
        }
    }

    let modules = BTreeMap::from([(POLICY_FILE.to_string(), module.to_string())]);
    let graph = ModuleCompiler::new(engine)
        .with_dialect(dialect)
        .compile(&modules)?;
    let context = QueryContext {
        package: graph.sole_module().map(|m| m.package.clone()),
        imports: Vec::new(),
    };

    let body = QueryBody { exprs };
    let query = match QueryCompiler::new(&graph, &context, options)
        .with_stop_after(QueryStage::RewriteLocals)
        .run(&body)
    {
        Ok(query) | Err(Interrupt::Stop(query)) => query,
        Err(Interrupt::Failed(err)) => return Err(err),
    };
    Ok(variables(&query, dialect))
}

fn variables(query: &CompiledQuery, dialect: Dialect) -> Vec<String> {
    let options = ParserOptions::new(dialect);
    let mut vars = BTreeSet::new();
    for expr in &query.body.exprs {
        let tokens = &expr.tokens;
        for (i, tok) in tokens.iter().enumerate() {
            if !is_ref_head(tokens, i, &options) {
                continue;
            }
            let extended = tokens
                .get(i + 1)
                .is_some_and(|t| t.is_punct(".") || t.is_punct("[") || t.is_punct("("));
            if extended || matches!(tok.text.as_str(), "_" | "input" | "data") {
                continue;
            }
            let name = query.rewritten_vars.get(&tok.text).unwrap_or(&tok.text);
            vars.insert(name.clone());
        }
    }
    vars.into_iter().collect()
}
