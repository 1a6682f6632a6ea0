//! Turning a selection into a query body.
//!
//! A selection is whatever text the caller highlighted: an expression, a
//! rule definition, a package line, an import. Each top-level statement is
//! classified and contributes to the query body, or is dropped with a
//! diagnostic saying why.

use serde::Serialize;
use std::fmt;
use syntax::{Errors, Expr, Import, Location, ParserOptions, Path, Statement, parse_statements};
use tracing::warn;

/// File name used in locations inside a selection.
pub const SELECTION_FILE: &str = "selection";

/// A selection element that was left out of evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
}

impl Diagnostic {
    fn new(location: &Location, message: String) -> Self {
        Self {
            location: location.clone(),
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SELECTION_FILE}:{}:{}: {}",
            self.location.row, self.location.col, self.message
        )
    }
}

/// Synthetic binding names and the rules they stand for, in the order the
/// rules were selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticNames(Vec<(String, String)>);

impl SyntheticNames {
    /// Record `rule` and return its synthetic name, or `None` if the rule
    /// was already recorded.
    pub fn insert(&mut self, rule: &str) -> Option<String> {
        if self.0.iter().any(|(_, original)| original == rule) {
            return None;
        }
        let synthetic = format!("__{rule}__");
        self.0.push((synthetic.clone(), rule.to_string()));
        Some(synthetic)
    }

    /// The rule a synthetic binding stands for.
    pub fn original(&self, synthetic: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == synthetic)
            .map(|(_, original)| original.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(s, o)| (s.as_str(), o.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An ordered list of query expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBody {
    pub exprs: Vec<Expr>,
}

impl QueryBody {
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }
}

impl fmt::Display for QueryBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{expr}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub body: QueryBody,
    pub synthetic: SyntheticNames,
    pub diagnostics: Vec<Diagnostic>,
}

/// How one selected statement takes part in the query.
enum Selected {
    Package(Path, Location),
    Body(Vec<Expr>),
    Rule { name: String, location: Location },
    Function { name: String, location: Location },
    Import(Import),
}

impl From<Statement> for Selected {
    fn from(statement: Statement) -> Self {
        match statement {
            Statement::Package(p) => Selected::Package(p.path, p.location),
            Statement::Body(body) => Selected::Body(body.exprs),
            Statement::Rule(rule) if rule.is_function() => Selected::Function {
                name: rule.name,
                location: rule.location,
            },
            Statement::Rule(rule) => Selected::Rule {
                name: rule.name,
                location: rule.location,
            },
            Statement::Import(import) => Selected::Import(import),
        }
    }
}

/// Parse `text` into a query body. Rules are read from `package`.
pub fn parse_selection(
    text: &str,
    options: &ParserOptions,
    package: &Path,
) -> Result<Selection, Errors> {
    let outline = parse_statements(SELECTION_FILE, text, options)?;
    let selected: Vec<Selected> = outline.statements.into_iter().map(Selected::from).collect();

    let package_line = selected.iter().find_map(|s| match s {
        Selected::Package(path, location) => Some((path, location)),
        _ => None,
    });
    if let Some((path, location)) = package_line {
        let expr = Expr::parse(SELECTION_FILE, path.to_string(), location.position())?;
        return Ok(Selection {
            body: QueryBody { exprs: vec![expr] },
            ..Selection::default()
        });
    }

    let mut selection = Selection::default();
    for statement in selected {
        match statement {
            Selected::Package(..) => {}
            Selected::Body(exprs) => selection.body.exprs.extend(exprs),
            Selected::Rule { name, location } => {
                let Some(assigned) = selection.synthetic.insert(&name) else {
                    continue;
                };
                let text = format!("{assigned} := {{__x__ | __x__ := {package}.{name}}}");
                match Expr::parse(SELECTION_FILE, text, location.position()) {
                    Ok(expr) => selection.body.exprs.push(expr),
                    Err(err) => {
                        warn!(error = %err, rule = %name, "query construction error");
                        selection.diagnostics.push(Diagnostic::new(
                            &location,
                            format!(
                                "Ignoring `rule` '{name}'; failed to construct assignment for query"
                            ),
                        ));
                    }
                }
            }
            Selected::Function { name, location } => {
                selection.diagnostics.push(Diagnostic::new(
                    &location,
                    format!("Ignoring function definition for '{name}' during evaluation."),
                ));
            }
            Selected::Import(import) => {
                let name = import.display_name().unwrap_or_default();
                selection.diagnostics.push(Diagnostic::new(
                    &import.location,
                    format!("Ignoring `import` statement for '{name}' during evaluation."),
                ));
            }
        }
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use syntax::Dialect;

    fn select(text: &str) -> Selection {
        let package = Path::new(["data", "play"]);
        parse_selection(text, &ParserOptions::new(Dialect::V0), &package).unwrap()
    }

    fn diagnostics(selection: &Selection) -> Vec<String> {
        selection.diagnostics.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_rule_definition_becomes_synthetic_assignment() {
        let selection = select(
            "default hello = false\nhello {\n  input.message == \"world\"\n}",
        );
        assert_eq!(
            selection.body.to_string(),
            "__hello__ := {__x__ | __x__ := data.play.hello}"
        );
        assert_eq!(selection.synthetic.original("__hello__"), Some("hello"));
        assert_eq!(selection.synthetic.len(), 1);
    }

    #[test]
    fn test_package_selection_discards_everything_else() {
        let selection = select("a(x) = x { true }\npackage play\nb := 1");
        assert_eq!(selection.body.to_string(), "data.play");
        assert!(selection.diagnostics.is_empty());
        assert!(selection.synthetic.is_empty());
    }

    #[test]
    fn test_functions_are_ignored_with_diagnostics() {
        let selection = select(
            "a(x) = x {\n\t\t\ttrue\n\t\t}\n\t\t\t\t\tb(x, y) {\n\t\t\ttrue\n\t\t}",
        );
        assert!(selection.body.is_empty());
        assert_eq!(
            diagnostics(&selection),
            [
                "selection:1:1: Ignoring function definition for 'a' during evaluation.",
                "selection:4:6: Ignoring function definition for 'b' during evaluation.",
            ]
        );
    }

    #[test]
    fn test_imports_are_ignored_with_diagnostics() {
        let selection = select("import input.message\n\t\t\t\t\timport input.message as foo\n\t\t\t\t\tb := 1");
        assert_eq!(selection.body.to_string(), "b := 1");
        assert_eq!(
            diagnostics(&selection),
            [
                "selection:1:1: Ignoring `import` statement for 'message' during evaluation.",
                "selection:2:6: Ignoring `import` statement for 'foo' during evaluation.",
            ]
        );
    }

    #[test]
    fn test_root_import_names_nothing() {
        let selection = select("import input");
        assert_eq!(
            diagnostics(&selection),
            ["selection:1:1: Ignoring `import` statement for '' during evaluation."]
        );
    }

    #[test]
    fn test_bodies_keep_source_order_and_bare_refs() {
        let selection = select("x := 1\nallow\ny := x + 1");
        assert_eq!(selection.body.to_string(), "x := 1; allow; y := x + 1");
        assert!(selection.synthetic.is_empty());
    }

    #[test]
    fn test_comment_only_selection_is_empty() {
        let selection = select("# Some comment");
        assert!(selection.body.is_empty());
        assert!(selection.diagnostics.is_empty());
    }

    #[test]
    fn test_synthetic_names_coalesce() {
        let mut names = SyntheticNames::default();
        assert_eq!(names.insert("r"), Some("__r__".to_string()));
        assert_eq!(names.insert("r"), None);
        let all: Vec<_> = names.iter().collect();
        assert_eq!(all, [("__r__", "r")]);
    }

    #[test]
    fn test_unbalanced_selection_is_parse_error() {
        let package = Path::new(["data", "play"]);
        let err = parse_selection("x := {", &ParserOptions::default(), &package).unwrap_err();
        assert_eq!(err.first().unwrap().code, syntax::ErrorCode::Parse);
    }

    #[test]
    fn test_malformed_selections_are_rejected_before_synthesis() {
        let package = Path::new(["data", "play"]);
        let options = ParserOptions::new(Dialect::V1);
        for text in ["x := -", "x := 1 /* */", "r.", "x := {1: }", "some", "else", "r if"] {
            let err = parse_selection(text, &options, &package).unwrap_err();
            assert_eq!(err.first().unwrap().code, syntax::ErrorCode::Parse, "{text}");
        }
    }
}
