//! Located errors shared by every parse and compile stage.

use crate::Location;
use serde::Serialize;
use std::fmt;

/// The family an error belongs to, rendered the way policy authors know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "rego_parse_error")]
    Parse,
    #[serde(rename = "rego_compile_error")]
    Compile,
    #[serde(rename = "rego_type_error")]
    Type,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Parse => "rego_parse_error",
            ErrorCode::Compile => "rego_compile_error",
            ErrorCode::Type => "rego_type_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error with an optional source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Parse, message)
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Compile, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Type, message)
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{location}: {}: {}", self.code, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for Error {}

/// An ordered list of errors reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: Error) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: Errors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Error> {
        self.0.first()
    }

    /// `Ok(())` when nothing was reported.
    pub fn into_result(self) -> std::result::Result<(), Errors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self(vec![error])
    }
}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl FromIterator<Error> for Errors {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => f.write_str("no errors"),
            [only] => write!(f, "1 error occurred: {only}"),
            all => {
                write!(f, "{} errors occurred:", all.len())?;
                for error in all {
                    write!(f, "\n{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Errors {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    #[test]
    fn test_single_error_without_location() {
        let errors = Errors::from(Error::compile("empty query cannot be compiled"));
        assert_eq!(
            errors.to_string(),
            "1 error occurred: rego_compile_error: empty query cannot be compiled"
        );
    }

    #[test]
    fn test_several_errors_are_listed_one_per_line() {
        let errors: Errors = vec![
            Error::parse("unexpected } token")
                .with_location(Location::new("a.rego", Position::new(3, 1))),
            Error::type_error("undefined function foo")
                .with_location(Location::new("b.rego", Position::new(7, 4))),
        ]
        .into();
        assert_eq!(
            errors.to_string(),
            "2 errors occurred:\na.rego:3: rego_parse_error: unexpected } token\nb.rego:7: rego_type_error: undefined function foo"
        );
    }

    #[test]
    fn test_empty_list_converts_to_ok() {
        assert!(Errors::new().into_result().is_ok());
    }
}
