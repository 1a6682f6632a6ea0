//! Statement outline.
//!
//! Splits a source into top-level statements and classifies each one as a
//! package, import, rule or query body. No expression tree is built: bodies
//! keep their source text and tokens.

use crate::path::Path;
use crate::token::{Token, TokenKind, tokenize};
use crate::{Dialect, Error, Errors, FUTURE_KEYWORDS, Location, ParserOptions, Position};
use std::fmt;
use std::ops::Range;

/// Punctuation that cannot end a statement; the next line continues it.
const CONTINUATION_PUNCT: &[&str] = &[
    ":=", "=", "==", "!=", "<", "<=", ">", ">=", "+", "-", "*", "/", "%", "|", "&", ",",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Full path including the `data` root.
    pub path: Path,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: Path,
    pub alias: Option<String>,
    pub location: Location,
}

impl Import {
    /// The alias, else the last path segment. Root-only imports have no name.
    pub fn display_name(&self) -> Option<&str> {
        match &self.alias {
            Some(alias) => Some(alias),
            None if self.path.len() > 1 => self.path.last(),
            None => None,
        }
    }

    /// The name the import binds inside a module or query.
    pub fn local_name(&self) -> &str {
        self.alias
            .as_deref()
            .or_else(|| self.path.last())
            .unwrap_or_default()
    }

    /// `future.keywords…` and `rego.v1` imports switch parser features
    /// instead of binding a name.
    pub fn is_keyword_import(&self) -> bool {
        matches!(self.path.root(), "future" | "rego")
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {alias}")?;
        }
        Ok(())
    }
}

/// A rule or function definition, identified by its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    /// Number of declared arguments; zero for plain rules.
    pub arity: usize,
    pub is_default: bool,
    pub location: Location,
    /// Token range of the whole statement in the outlined source.
    pub tokens: Range<usize>,
}

impl Rule {
    pub fn is_function(&self) -> bool {
        self.arity > 0
    }
}

/// One expression of a query body.
///
/// Token spans index into `text`; token positions stay in the coordinates
/// of the source the expression was cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub text: String,
    pub tokens: Vec<Token>,
    pub location: Location,
}

impl Expr {
    /// Tokenize `text` as an expression starting at `origin` in `file`.
    pub fn parse(file: &str, text: impl Into<String>, origin: Position) -> Result<Expr, Error> {
        let text = text.into();
        let tokens = tokenize(file, &text)
            .map_err(|mut err| {
                if let Some(location) = &mut err.location {
                    let pos = location.position().relative_to(origin);
                    location.row = pos.row;
                    location.col = pos.col;
                }
                err
            })?
            .into_iter()
            .map(|mut token| {
                token.pos = token.pos.relative_to(origin);
                token
            })
            .collect();
        Ok(Expr {
            text,
            tokens,
            location: Location::new(file, origin),
        })
    }

    /// Apply non-overlapping `(span, replacement)` edits to the text and
    /// re-tokenize the result at the same location.
    pub fn rewrite(&self, mut edits: Vec<(Range<usize>, String)>) -> Result<Expr, Error> {
        if edits.is_empty() {
            return Ok(self.clone());
        }
        edits.sort_by_key(|(span, _)| span.start);
        let mut text = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (span, replacement) in &edits {
            text.push_str(&self.text[cursor..span.start]);
            text.push_str(replacement);
            cursor = span.end;
        }
        text.push_str(&self.text[cursor..]);
        Expr::parse(&self.location.file, text, self.location.position())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub exprs: Vec<Expr>,
    pub location: Location,
    pub tokens: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Package(Package),
    Import(Import),
    Rule(Rule),
    Body(Body),
}

impl Statement {
    pub fn location(&self) -> &Location {
        match self {
            Statement::Package(p) => &p.location,
            Statement::Import(i) => &i.location,
            Statement::Rule(r) => &r.location,
            Statement::Body(b) => &b.location,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Package(_) => "package",
            Statement::Import(_) => "import",
            Statement::Rule(_) => "rule",
            Statement::Body(_) => "body",
        }
    }
}

/// A source split into top-level statements.
#[derive(Debug, Clone)]
pub struct Outline {
    pub file: String,
    pub tokens: Vec<Token>,
    pub statements: Vec<Statement>,
    /// Byte range of each statement in the source, parallel to `statements`.
    pub spans: Vec<Range<usize>>,
}

/// Outline `source`. Keyword imports inside the source take effect for the
/// statements that follow them.
pub fn outline(file: &str, source: &str, options: &ParserOptions) -> Result<Outline, Errors> {
    let tokens = tokenize(file, source)?;
    let groups = split_statements(file, &tokens)?;

    let mut options = options.clone();
    let mut statements = Vec::with_capacity(groups.len());
    let mut spans = Vec::with_capacity(groups.len());
    let mut errors = Errors::new();
    for range in groups {
        let span = tokens[range.start].span.start..tokens[range.end - 1].span.end;
        let parser = StatementParser {
            file,
            source,
            tokens: &tokens,
            range,
            options: &options,
        };
        match parser.parse() {
            Ok(statement) => {
                if let Statement::Import(import) = &statement {
                    enable_import_keywords(&mut options, import);
                }
                statements.push(statement);
                spans.push(span);
            }
            Err(err) => errors.push(err),
        }
    }
    errors.into_result()?;

    Ok(Outline {
        file: file.to_string(),
        tokens,
        statements,
        spans,
    })
}

pub(crate) fn enable_import_keywords(options: &mut ParserOptions, import: &Import) {
    let segments: Vec<&str> = import.path.segments().iter().map(String::as_str).collect();
    let current = std::mem::take(options);
    *options = match segments.as_slice() {
        ["future", "keywords"] => current.with_all_future_keywords(),
        ["future", "keywords", keyword] => current.with_future_keyword(keyword),
        ["rego", "v1"] => current.with_dialect(Dialect::V1),
        _ => current,
    };
}

/// Group tokens into statements: a statement ends at a newline outside any
/// brackets, unless the next line starts with `else` or the line ends with
/// an operator.
fn split_statements(file: &str, tokens: &[Token]) -> Result<Vec<Range<usize>>, Error> {
    let mut groups: Vec<Range<usize>> = Vec::new();
    let mut open: Vec<&Token> = Vec::new();
    let mut start: Option<usize> = None;

    for (i, token) in tokens.iter().enumerate() {
        if token.opens() {
            open.push(token);
        } else if token.closes() {
            let matched = open.pop().is_some_and(|opener| {
                matches!(
                    (opener.text.as_str(), token.text.as_str()),
                    ("{", "}") | ("[", "]") | ("(", ")")
                )
            });
            if !matched {
                return Err(Error::parse(format!("unexpected {} token", token.text))
                    .with_location(Location::new(file, token.pos)));
            }
        }

        if open.is_empty() && token.is_newline() {
            if let Some(s) = start.take() {
                push_statement(&mut groups, tokens, s..i);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(opener) = open.last() {
        return Err(
            Error::parse(format!("unexpected eof token: {} is never closed", opener.text))
                .with_location(Location::new(file, opener.pos)),
        );
    }
    if let Some(s) = start {
        push_statement(&mut groups, tokens, s..tokens.len());
    }
    Ok(groups)
}

fn push_statement(groups: &mut Vec<Range<usize>>, tokens: &[Token], range: Range<usize>) {
    if let Some(last) = groups.last_mut() {
        let tail = &tokens[last.end - 1];
        let continues = tokens[range.start].is_ident("else")
            || (tail.kind == TokenKind::Punct && CONTINUATION_PUNCT.contains(&tail.text.as_str()));
        if continues {
            last.end = range.end;
            return;
        }
    }
    groups.push(range);
}

struct StatementParser<'a> {
    file: &'a str,
    source: &'a str,
    tokens: &'a [Token],
    range: Range<usize>,
    options: &'a ParserOptions,
}

impl StatementParser<'_> {
    fn parse(self) -> Result<Statement, Error> {
        let toks = &self.tokens[self.range.clone()];
        let first = &toks[0];
        if first.is_ident("package") {
            self.package(toks).map(Statement::Package)
        } else if first.is_ident("import") {
            self.import(toks).map(Statement::Import)
        } else if self.is_rule(toks) {
            self.rule(toks).map(Statement::Rule)
        } else {
            Ok(Statement::Body(self.body(toks)))
        }
    }

    fn package(&self, toks: &[Token]) -> Result<Package, Error> {
        let (segments, next) = self.reference(toks, 1, "expected package path")?;
        self.expect_end(toks, next)?;
        Ok(Package {
            path: Path::new(std::iter::once("data".to_string()).chain(segments)),
            location: self.location(&toks[0]),
        })
    }

    fn import(&self, toks: &[Token]) -> Result<Import, Error> {
        let (segments, mut next) = self.reference(toks, 1, "expected import path")?;
        let path = Path::new(segments);
        self.validate_import_path(&path, &toks[1])?;

        let mut alias = None;
        if toks.get(next).is_some_and(|t| t.is_ident("as")) {
            let name = toks
                .get(next + 1)
                .filter(|t| t.is_name(self.options))
                .ok_or_else(|| self.unexpected(toks, next + 1, "expected import alias"))?;
            alias = Some(name.text.clone());
            next += 2;
        }
        self.expect_end(toks, next)?;

        Ok(Import {
            path,
            alias,
            location: self.location(&toks[0]),
        })
    }

    fn validate_import_path(&self, path: &Path, at: &Token) -> Result<(), Error> {
        let segments: Vec<&str> = path.segments().iter().map(String::as_str).collect();
        let valid = match segments.as_slice() {
            ["input" | "data", ..] => true,
            ["future", "keywords"] => true,
            ["future", "keywords", keyword] => FUTURE_KEYWORDS.contains(keyword),
            ["rego", "v1"] => true,
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(Error::parse(format!(
                "invalid import path {path}: must begin with input or data, or name a known future keyword"
            ))
            .with_location(self.location(at)))
        }
    }

    fn is_rule(&self, toks: &[Token]) -> bool {
        let opts = self.options;
        if toks[0].is_ident("default") {
            return true;
        }
        let mut depth = 0usize;
        let mut every = false;
        for (i, tok) in toks.iter().enumerate() {
            if depth == 0 {
                if tok.is_keyword("every", opts) {
                    every = true;
                }
                if tok.is_keyword("if", opts) {
                    return true;
                }
                if tok.is_keyword("contains", opts)
                    && !toks.get(i + 1).is_some_and(|t| t.is_punct("("))
                {
                    return true;
                }
                if tok.is_punct("{") && !every && i > 0 {
                    let prev = &toks[i - 1];
                    if prev.ends_term(opts) || prev.is_ident("else") {
                        return true;
                    }
                }
            }
            if tok.opens() {
                depth += 1;
            } else if tok.closes() {
                depth = depth.saturating_sub(1);
            }
        }
        false
    }

    fn rule(&self, toks: &[Token]) -> Result<Rule, Error> {
        let is_default = toks[0].is_ident("default");
        let at = usize::from(is_default);
        let name = toks
            .get(at)
            .filter(|t| t.is_name(self.options))
            .ok_or_else(|| self.unexpected(toks, at, "expected rule name"))?;
        let arity = if toks.get(at + 1).is_some_and(|t| t.is_punct("(")) {
            count_args(&toks[at + 1..])
        } else {
            0
        };
        Ok(Rule {
            name: name.text.clone(),
            arity,
            is_default,
            location: self.location(&toks[0]),
            tokens: self.range.clone(),
        })
    }

    fn body(&self, toks: &[Token]) -> Body {
        let mut exprs = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, tok) in toks.iter().enumerate() {
            if tok.opens() {
                depth += 1;
            } else if tok.closes() {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && tok.is_punct(";") {
                exprs.extend(self.expr(&toks[start..i]));
                start = i + 1;
            }
        }
        exprs.extend(self.expr(&toks[start..]));
        Body {
            exprs,
            location: self.location(&toks[0]),
            tokens: self.range.clone(),
        }
    }

    fn expr(&self, toks: &[Token]) -> Option<Expr> {
        let first = toks.iter().position(|t| !t.is_newline())?;
        let last = toks.iter().rposition(|t| !t.is_newline())?;
        let toks = &toks[first..=last];
        let base = toks[0].span.start;
        let end = toks[toks.len() - 1].span.end;
        Some(Expr {
            text: self.source[base..end].to_string(),
            tokens: toks
                .iter()
                .map(|t| Token {
                    span: t.span.start - base..t.span.end - base,
                    ..t.clone()
                })
                .collect(),
            location: self.location(&toks[0]),
        })
    }

    /// `name(.name | ["string"])*` starting at `start`.
    fn reference(
        &self,
        toks: &[Token],
        start: usize,
        expected: &str,
    ) -> Result<(Vec<String>, usize), Error> {
        let head = toks
            .get(start)
            .filter(|t| t.kind == TokenKind::Ident)
            .ok_or_else(|| self.unexpected(toks, start, expected))?;
        let mut segments = vec![head.text.clone()];
        let mut i = start + 1;
        loop {
            let (Some(a), Some(b)) = (toks.get(i), toks.get(i + 1)) else {
                break;
            };
            if a.is_punct(".") && b.kind == TokenKind::Ident {
                segments.push(b.text.clone());
                i += 2;
                continue;
            }
            if a.is_punct("[") && toks.get(i + 2).is_some_and(|c| c.is_punct("]")) {
                if let Some(value) = b.string_value() {
                    segments.push(value);
                    i += 3;
                    continue;
                }
            }
            break;
        }
        Ok((segments, i))
    }

    fn expect_end(&self, toks: &[Token], next: usize) -> Result<(), Error> {
        match toks[next.min(toks.len())..].iter().position(|t| !t.is_newline()) {
            None => Ok(()),
            Some(offset) => Err(self.unexpected(toks, next + offset, "expected end of statement")),
        }
    }

    fn unexpected(&self, toks: &[Token], at: usize, expected: &str) -> Error {
        match toks.get(at) {
            Some(tok) => Error::parse(format!("unexpected {} token: {expected}", tok.text))
                .with_location(self.location(tok)),
            None => {
                let last = &toks[toks.len() - 1];
                Error::parse(format!("unexpected eof token: {expected}"))
                    .with_location(self.location(last))
            }
        }
    }

    fn location(&self, token: &Token) -> Location {
        Location::new(self.file, token.pos)
    }
}

/// Count the arguments of a parenthesised list starting at `toks[0]`.
fn count_args(toks: &[Token]) -> usize {
    let mut depth = 0usize;
    let mut commas = 0;
    let mut any = false;
    for tok in toks {
        if tok.opens() {
            depth += 1;
            if depth == 1 {
                continue;
            }
        } else if tok.closes() {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                break;
            }
        } else if depth == 1 && tok.is_punct(",") {
            commas += 1;
            continue;
        }
        if !tok.is_newline() {
            any = true;
        }
    }
    if any { commas + 1 } else { 0 }
}

/// A parsed policy module.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub package: Package,
    pub imports: Vec<Import>,
    pub rules: Vec<Rule>,
    pub tokens: Vec<Token>,
    pub dialect: Dialect,
}

impl Module {
    /// Outline a module. The first statement must be its package; top-level
    /// bodies such as `allow := true` are read as rules.
    pub fn parse(name: &str, source: &str, dialect: Dialect) -> Result<Module, Errors> {
        let options = ParserOptions::new(dialect);
        let outline = outline(name, source, &options)?;
        let mut statements = outline.statements.into_iter();

        let package = match statements.next() {
            Some(Statement::Package(package)) => package,
            Some(other) => {
                return Err(Error::parse(format!(
                    "unexpected {} statement: package expected",
                    other.kind()
                ))
                .with_location(other.location().clone())
                .into());
            }
            None => {
                return Err(Error::parse("empty module")
                    .with_location(Location::new(name, Position::START))
                    .into());
            }
        };

        let mut imports = Vec::new();
        let mut rules = Vec::new();
        let mut errors = Errors::new();
        for statement in statements {
            match statement {
                Statement::Package(p) => errors.push(
                    Error::parse("unexpected package statement").with_location(p.location),
                ),
                Statement::Import(import) => imports.push(import),
                Statement::Rule(rule) => rules.push(rule),
                Statement::Body(body) => match body_as_rule(&body, &options) {
                    Some(rule) => rules.push(rule),
                    None => errors.push(
                        Error::parse("top-level expressions must be rules")
                            .with_location(body.location),
                    ),
                },
            }
        }
        errors.into_result()?;

        Ok(Module {
            name: name.to_string(),
            package,
            imports,
            rules,
            tokens: outline.tokens,
            dialect,
        })
    }

    pub fn rule_tokens(&self, rule: &Rule) -> &[Token] {
        &self.tokens[rule.tokens.clone()]
    }

    /// The keyword set in force after the module's imports.
    pub fn parser_options(&self) -> ParserOptions {
        let mut options = ParserOptions::new(self.dialect);
        for import in &self.imports {
            enable_import_keywords(&mut options, import);
        }
        options
    }
}

fn body_as_rule(body: &Body, options: &ParserOptions) -> Option<Rule> {
    let [expr] = body.exprs.as_slice() else {
        return None;
    };
    let head = expr.tokens.first().filter(|t| t.is_name(options))?;
    let arity = match expr.tokens.get(1) {
        Some(t) if t.is_punct("(") => count_args(&expr.tokens[1..]),
        _ => 0,
    };
    Some(Rule {
        name: head.text.clone(),
        arity,
        is_default: false,
        location: expr.location.clone(),
        tokens: body.tokens.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(source: &str, dialect: Dialect) -> Vec<Statement> {
        outline("selection", source, &ParserOptions::new(dialect))
            .unwrap()
            .statements
    }

    fn rule(statement: &Statement) -> &Rule {
        match statement {
            Statement::Rule(rule) => rule,
            other => panic!("expected rule, got {other:?}"),
        }
    }

    #[test]
    fn test_package_statement() {
        let stmts = statements("package play.nested", Dialect::V1);
        let Statement::Package(p) = &stmts[0] else {
            panic!("expected package");
        };
        assert_eq!(p.path.to_string(), "data.play.nested");
    }

    #[test]
    fn test_import_with_alias_and_display_name() {
        let stmts = statements("import input.message\nimport input.message as foo", Dialect::V1);
        let names: Vec<_> = stmts
            .iter()
            .map(|s| match s {
                Statement::Import(i) => i.display_name().unwrap().to_string(),
                other => panic!("expected import, got {other:?}"),
            })
            .collect();
        assert_eq!(names, ["message", "foo"]);
    }

    #[test]
    fn test_root_only_import_has_no_display_name() {
        let stmts = statements("import input", Dialect::V1);
        let Statement::Import(import) = &stmts[0] else {
            panic!("expected import");
        };
        assert_eq!(import.display_name(), None);
        assert_eq!(import.local_name(), "input");
    }

    #[test]
    fn test_functions_and_rules_across_dialects() {
        let src = "a(x) = x {\n\t\t\ttrue\n\t\t}\n\t\t\t\t\tb(x, y) {\n\t\t\ttrue\n\t\t}";
        let stmts = statements(src, Dialect::V0);
        assert_eq!(stmts.len(), 2);
        assert_eq!(rule(&stmts[0]).arity, 1);
        let b = rule(&stmts[1]);
        assert_eq!((b.name.as_str(), b.arity), ("b", 2));
        assert_eq!(b.location.position(), Position::new(4, 6));
    }

    #[test]
    fn test_v1_rules_use_if_and_contains() {
        let src = "allow if input.x == 1\ndeny contains msg if { msg := \"no\" }\nf(x) := y if { y := x }";
        let stmts = statements(src, Dialect::V1);
        let names: Vec<&str> = stmts.iter().map(|s| rule(s).name.as_str()).collect();
        let arities: Vec<usize> = stmts.iter().map(|s| rule(s).arity).collect();
        assert_eq!(names, ["allow", "deny", "f"]);
        assert_eq!(arities, [0, 0, 1]);
    }

    #[test]
    fn test_default_rule_and_else_chain() {
        let src = "default hello := false\nhello if {\n  input.m == \"world\"\n} else := false";
        let stmts = statements(src, Dialect::V1);
        assert_eq!(stmts.len(), 2);
        assert!(rule(&stmts[0]).is_default);
        assert_eq!(rule(&stmts[1]).name, "hello");
    }

    #[test]
    fn test_bodies_split_on_semicolons() {
        let stmts = statements("x := 1; y := {\"a\": x}\nsome z in [1, 2]", Dialect::V1);
        let Statement::Body(first) = &stmts[0] else {
            panic!("expected body");
        };
        let texts: Vec<_> = first.exprs.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["x := 1", "y := {\"a\": x}"]);
        assert_eq!(first.exprs[1].location.position(), Position::new(1, 9));
        assert!(matches!(stmts[1], Statement::Body(_)));
    }

    #[test]
    fn test_every_with_block_is_a_body() {
        let stmts = statements("every x in [1, 2] { x > 0 }", Dialect::V1);
        assert!(matches!(stmts[0], Statement::Body(_)));
    }

    #[test]
    fn test_if_is_plain_identifier_in_v0() {
        let stmts = statements("if := 1", Dialect::V0);
        assert!(matches!(stmts[0], Statement::Body(_)));
    }

    #[test]
    fn test_keyword_import_enables_later_rules() {
        let src = "import future.keywords.if\nallow if true";
        let stmts = statements(src, Dialect::V0);
        assert_eq!(rule(&stmts[1]).name, "allow");
    }

    #[test]
    fn test_operator_at_line_end_continues_statement() {
        let stmts = statements("x := 1 +\n  2", Dialect::V1);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_unbalanced_brackets_are_reported() {
        let err = outline("m.rego", "allow if {", &ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("never closed"), "{err}");
        let err = outline("m.rego", "x := 1 }", &ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unexpected } token"), "{err}");
    }

    #[test]
    fn test_invalid_import_root() {
        let err = outline("q", "import foo.bar", &ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains("invalid import path foo.bar"), "{err}");
    }

    #[test]
    fn test_module_requires_package_first() {
        let err = Module::parse("m.rego", "allow := true", Dialect::V1).unwrap_err();
        assert!(err.to_string().contains("package expected"), "{err}");
        let err = Module::parse("m.rego", "# only a comment\n", Dialect::V1).unwrap_err();
        assert!(err.to_string().contains("empty module"), "{err}");
    }

    #[test]
    fn test_module_bodies_become_rules() {
        let src = "package play\n\nimport input.user\n\nc := 1\nallow if user == \"alice\"";
        let module = Module::parse("play.rego", src, Dialect::V1).unwrap();
        assert_eq!(module.package.path.to_string(), "data.play");
        assert_eq!(module.imports.len(), 1);
        let names: Vec<_> = module.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["c", "allow"]);
        assert_eq!(module.rule_tokens(&module.rules[0])[0].text, "c");
    }

    #[test]
    fn test_module_parser_options_follow_imports() {
        let src = "package play\nimport future.keywords.in\nallow { 1 in [1] }";
        let module = Module::parse("play.rego", src, Dialect::V0).unwrap();
        let options = module.parser_options();
        assert!(options.is_keyword("in"));
        assert!(!options.is_keyword("if"));
    }

    #[test]
    fn test_expr_rewrite_keeps_origin() {
        let expr = Expr::parse("q", "x := y", Position::new(3, 4)).unwrap();
        let rewritten = expr.rewrite(vec![(0..1, "__local0__".into())]).unwrap();
        assert_eq!(rewritten.text, "__local0__ := y");
        assert_eq!(rewritten.location.position(), Position::new(3, 4));
        assert_eq!(rewritten.tokens[0].pos, Position::new(3, 4));
    }
}
