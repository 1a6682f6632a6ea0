//! Token-level checks on calls: the network safety guard, undefined
//! functions and deprecated built-ins.

use crate::catalog::{is_denylisted, is_deprecated};
use crate::{CapabilitySet, Violation};
use std::collections::BTreeSet;
use syntax::{ParserOptions, RefSpan, Token, refs};

/// What a token stream is checked against: the keyword set it was parsed
/// with and the names bound locally (rules of the package, imports). A
/// reference whose head is a local name never denotes a built-in.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub options: &'a ParserOptions,
    pub locals: &'a BTreeSet<String>,
}

impl<'a> Scope<'a> {
    pub fn new(options: &'a ParserOptions, locals: &'a BTreeSet<String>) -> Self {
        Self { options, locals }
    }

    fn is_local(&self, r: &RefSpan) -> bool {
        self.locals.contains(r.head())
    }
}

/// Flags every use of a denylisted built-in: direct calls, and references
/// bound as values through `=`, `:=` or a `with … as` substitution.
pub struct SafetyGuard;

impl SafetyGuard {
    pub fn check(tokens: &[Token], scope: Scope<'_>) -> Vec<Violation> {
        refs(tokens, scope.options)
            .filter(|r| r.dotted_end == r.end && is_denylisted(&r.name) && !scope.is_local(r))
            .filter_map(|r| {
                let position = tokens[r.start].pos;
                if r.is_call(tokens) {
                    return Some(Violation::UnsafeCall {
                        name: r.name,
                        position,
                    });
                }
                let bound = previous_token(tokens, r.start).is_some_and(|t| {
                    t.is_punct("=") || t.is_punct(":=") || t.is_ident("as")
                });
                bound.then(|| Violation::UnsafeReference {
                    name: r.name,
                    position,
                })
            })
            .collect()
    }
}

/// Calls whose callee is neither an allowed built-in, a local name, nor a
/// `data` reference. Denylisted callees are left to [`SafetyGuard`].
pub fn undefined_calls(
    tokens: &[Token],
    scope: Scope<'_>,
    capabilities: &CapabilitySet,
) -> Vec<Violation> {
    refs(tokens, scope.options)
        .filter(|r| r.is_call(tokens) && !scope.is_local(r))
        .filter(|r| !matches!(r.head(), "data" | "input"))
        .filter(|r| !capabilities.contains(&r.name) && !is_denylisted(&r.name))
        .map(|r| Violation::UndefinedFunction {
            position: tokens[r.start].pos,
            name: r.name,
        })
        .collect()
}

pub fn deprecated_calls(tokens: &[Token], scope: Scope<'_>) -> Vec<Violation> {
    refs(tokens, scope.options)
        .filter(|r| r.is_call(tokens) && !scope.is_local(r) && is_deprecated(&r.name))
        .map(|r| Violation::DeprecatedCall {
            position: tokens[r.start].pos,
            name: r.name,
        })
        .collect()
}

fn previous_token(tokens: &[Token], index: usize) -> Option<&Token> {
    tokens[..index].iter().rev().find(|t| !t.is_newline())
}
