//! Checks that only run when a module set is compiled in strict mode.

use capability::{Scope, deprecated_calls};
use syntax::{Error, Errors, Location, Module, Token, is_ref_head};

const SHADOWABLE_ROOTS: &[&str] = &["input", "data"];

pub(crate) fn check(module: &Module, scope: Scope<'_>) -> Errors {
    let mut errors = Errors::new();
    unused_imports(module, scope, &mut errors);
    for rule in &module.rules {
        let tokens = module.rule_tokens(rule);
        shadowed_roots(module, tokens, &mut errors);
        unused_assignments(module, tokens, scope, &mut errors);
        for violation in deprecated_calls(tokens, scope) {
            errors.push(violation.to_error(&module.name));
        }
    }
    errors
}

fn unused_imports(module: &Module, scope: Scope<'_>, errors: &mut Errors) {
    for import in module.imports.iter().filter(|i| !i.is_keyword_import()) {
        let name = import.local_name();
        let used = module.rules.iter().any(|rule| {
            let tokens = module.rule_tokens(rule);
            (0..tokens.len())
                .any(|i| tokens[i].text == name && is_ref_head(tokens, i, scope.options))
        });
        if !used {
            errors.push(
                Error::compile(format!("import {} unused", import.path))
                    .with_location(import.location.clone()),
            );
        }
    }
}

fn shadowed_roots(module: &Module, tokens: &[Token], errors: &mut Errors) {
    for (i, tok) in tokens.iter().enumerate() {
        let Some(root) = SHADOWABLE_ROOTS.iter().find(|r| tok.is_ident(r)) else {
            continue;
        };
        let assigned = tokens.get(i + 1).is_some_and(|t| t.is_punct(":="));
        let declared = i > 0 && tokens[i - 1].is_ident("some");
        if assigned || declared {
            errors.push(
                Error::compile(format!(
                    "variables must not shadow {root} (use a different variable name)"
                ))
                .with_location(Location::new(&module.name, tok.pos)),
            );
        }
    }
}

fn unused_assignments(module: &Module, tokens: &[Token], scope: Scope<'_>, errors: &mut Errors) {
    for (i, tok) in tokens.iter().enumerate().skip(1) {
        if !tok.is_name(scope.options) || tok.text == "_" {
            continue;
        }
        if !tokens.get(i + 1).is_some_and(|t| t.is_punct(":=")) {
            continue;
        }
        let prev = &tokens[i - 1];
        let starts_expr = prev.is_newline()
            || prev.is_punct("{")
            || prev.is_punct(";")
            || prev.is_punct("|")
            || prev.is_keyword("if", scope.options);
        if !starts_expr || SHADOWABLE_ROOTS.contains(&tok.text.as_str()) {
            continue;
        }
        let used = (0..tokens.len())
            .any(|j| j != i && tokens[j].text == tok.text && is_ref_head(tokens, j, scope.options));
        if !used {
            errors.push(
                Error::compile(format!("assigned var {} unused", tok.text))
                    .with_location(Location::new(&module.name, tok.pos)),
            );
        }
    }
}
