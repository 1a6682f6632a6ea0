//! Grammar check through the `regorus` parser.
//!
//! The outline only splits and classifies statements. [`parse_statements`]
//! then hands every statement to the engine's own parser, so text the engine
//! would reject never reaches the compiler. Each statement is parsed on its
//! own with every other character blanked, which keeps the parser's rows and
//! columns equal to ours.

use crate::outline::{Outline, Statement, enable_import_keywords, outline};
use crate::{Dialect, Error, Errors, FUTURE_KEYWORDS, Location, ParserOptions, Position};
use regorus::unstable::{Parser, Source};
use std::ops::Range;

/// Module header the parser sees in front of import and rule statements.
const SCRATCH_PACKAGE: &str = "package __selection__\n";

/// Outline `source` and check every statement against the engine grammar.
pub fn parse_statements(
    file: &str,
    source: &str,
    options: &ParserOptions,
) -> Result<Outline, Errors> {
    let outline = outline(file, source, options)?;
    let mut options = options.clone();
    let mut errors = Errors::new();
    for (statement, span) in outline.statements.iter().zip(&outline.spans) {
        if let Err(err) = check_statement(file, source, span.clone(), statement, &options) {
            errors.push(err);
        }
        if let Statement::Import(import) = statement {
            enable_import_keywords(&mut options, import);
        }
    }
    errors.into_result()?;
    Ok(outline)
}

fn check_statement(
    file: &str,
    source: &str,
    span: Range<usize>,
    statement: &Statement,
    options: &ParserOptions,
) -> Result<(), Error> {
    let isolated = isolate(source, span);
    let (contents, header_rows) = match statement {
        Statement::Package(_) | Statement::Body(_) => (isolated, 0),
        Statement::Import(_) | Statement::Rule(_) => (format!("{SCRATCH_PACKAGE}{isolated}"), 1),
    };
    let parsed = Source::from_contents(file.to_string(), contents).and_then(|src| {
        let mut parser = Parser::new(&src)?;
        if options.dialect == Dialect::V1 {
            parser.enable_rego_v1()?;
        } else {
            for keyword in FUTURE_KEYWORDS.iter().filter(|k| options.is_keyword(k)) {
                parser.set_future_keyword(keyword, &None)?;
            }
        }
        match statement {
            Statement::Body(_) => parser.parse_user_query().map(|_| ()),
            _ => parser.parse().map(|_| ()),
        }
    });
    parsed.map_err(|err| {
        let report = Report::parse(&err.to_string());
        let mut error = Error::parse(report.message);
        if let Some(pos) = report.position {
            let row = pos.row.saturating_sub(header_rows).max(1);
            error = error.with_location(Location::new(file, Position::new(row, pos.col)));
        }
        error
    })
}

/// `source` with everything outside `span` blanked. Newlines survive so
/// rows and columns do not move.
fn isolate(source: &str, span: Range<usize>) -> String {
    source
        .char_indices()
        .map(|(i, c)| if span.contains(&i) || c == '\n' { c } else { ' ' })
        .collect()
}

/// A diagnostic rendered by `regorus`: a `--> file:row:col` line, a source
/// excerpt with a caret, then `error: message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub file: Option<String>,
    pub position: Option<Position>,
    pub message: String,
}

impl Report {
    /// Split a rendered diagnostic. Text without a location line comes back
    /// whole as the message.
    pub fn parse(text: &str) -> Report {
        let pointer = text
            .lines()
            .find_map(|line| line.trim_start().strip_prefix("--> "));
        let Some(pointer) = pointer else {
            return Report {
                file: None,
                position: None,
                message: text.trim().to_string(),
            };
        };

        let mut parts = pointer.rsplitn(3, ':');
        let col = parts.next().and_then(|c| c.trim().parse::<u32>().ok());
        let row = parts.next().and_then(|r| r.trim().parse::<u32>().ok());
        let file = parts.next().map(str::to_string);
        let position = row.zip(col).map(|(row, col)| Position::new(row, col));

        // The message follows the caret line; anything after it (a serde
        // detail, for instance) belongs to the message too.
        let message = match text.find("\nerror: ") {
            Some(at) => text[at + "\nerror: ".len()..].trim().to_string(),
            None => text.trim().to_string(),
        };
        Report {
            file,
            position,
            message,
        }
    }

    /// The identifier the caret points at, if the excerpt shows one.
    pub fn pointed_identifier(text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        let caret = lines.iter().position(|l| l.trim_end().ends_with('^'))?;
        let excerpt = lines.get(caret.checked_sub(1)?)?;
        let caret_col = lines[caret].find('^')?;
        let bar = excerpt.find('|')?;
        let code = excerpt.get(bar + 2..)?;
        let offset = caret_col.checked_sub(lines[caret].find('|')? + 2)?;
        let tail = code.get(offset..)?;
        let name: String = tail
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'))
            .collect();
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, dialect: Dialect) -> Result<Outline, Errors> {
        parse_statements("selection", source, &ParserOptions::new(dialect))
    }

    #[test]
    fn test_valid_selections_pass() {
        for source in [
            "x := 1",
            "package play.nested",
            "import input.user as u",
            "allow if input.ok",
            "f(x) := x + 1",
            "some x in [1, 2]; x > 1",
            "x := 1 # trailing comment",
        ] {
            assert!(parse(source, Dialect::V1).is_ok(), "{source}");
        }
    }

    #[test]
    fn test_engine_rejects_malformed_statements() {
        for source in [
            "x := -",
            "x := 1 /* */",
            "r.",
            "x := {1: }",
            "some",
            "else",
            "r if",
        ] {
            let err = parse(source, Dialect::V1).unwrap_err();
            assert!(
                err.iter().all(|e| e.code == crate::ErrorCode::Parse),
                "{source}: {err}"
            );
        }
    }

    #[test]
    fn test_error_positions_are_in_selection_coordinates() {
        let err = parse("x := 1\n\nallow if", Dialect::V1).unwrap_err();
        let first = err.iter().next().unwrap();
        let location = first.location.as_ref().unwrap();
        assert_eq!(location.file, "selection");
        assert_eq!(location.row, 3);
    }

    #[test]
    fn test_v0_keywords_follow_imports() {
        assert!(parse("import future.keywords.if\nallow if true", Dialect::V0).is_ok());
        assert!(parse("allow { true }", Dialect::V0).is_ok());
    }

    #[test]
    fn test_report_is_split() {
        let text = "\n--> play.rego:3:7\n  |\n3 | x := 1 / 0\n  |      ^\nerror: divide by zero";
        let report = Report::parse(text);
        assert_eq!(report.file.as_deref(), Some("play.rego"));
        assert_eq!(report.position, Some(Position::new(3, 7)));
        assert_eq!(report.message, "divide by zero");
        assert_eq!(Report::parse("plain failure").message, "plain failure");
    }

    #[test]
    fn test_pointed_identifier() {
        let text = "\n--> play.rego:1:6\n  |\n1 | x := to_number(\"a\")\n  |      ^\nerror: invalid";
        assert_eq!(Report::pointed_identifier(text).as_deref(), Some("to_number"));
        assert_eq!(Report::pointed_identifier("no excerpt"), None);
    }
}
