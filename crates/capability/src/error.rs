//! Capability violations.

use syntax::{Location, Position};
use thiserror::Error;

/// A call or reference the capability rules reject.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Violation {
    /// A denylisted built-in is called directly.
    #[error("unsafe built-in function calls in expression: {name}")]
    UnsafeCall { name: String, position: Position },

    /// A denylisted built-in is bound as a value, e.g. `with f as http.send`.
    #[error("unsafe built-in function calls in expression: {name}")]
    UnsafeReference { name: String, position: Position },

    /// A call to something that is neither a built-in nor a known rule.
    #[error("undefined function {name}")]
    UndefinedFunction { name: String, position: Position },

    /// A deprecated built-in is called under strict compilation.
    #[error("deprecated built-in function calls in expression: {name}")]
    DeprecatedCall { name: String, position: Position },
}

impl Violation {
    pub fn name(&self) -> &str {
        match self {
            Violation::UnsafeCall { name, .. }
            | Violation::UnsafeReference { name, .. }
            | Violation::UndefinedFunction { name, .. }
            | Violation::DeprecatedCall { name, .. } => name,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Violation::UnsafeCall { position, .. }
            | Violation::UnsafeReference { position, .. }
            | Violation::UndefinedFunction { position, .. }
            | Violation::DeprecatedCall { position, .. } => *position,
        }
    }

    /// Whether this violation comes from the network denylist.
    pub fn is_unsafe(&self) -> bool {
        matches!(
            self,
            Violation::UnsafeCall { .. } | Violation::UnsafeReference { .. }
        )
    }

    /// Report the violation as a compile-time type error located in `file`.
    pub fn to_error(&self, file: &str) -> syntax::Error {
        syntax::Error::type_error(self.to_string())
            .with_location(Location::new(file, self.position()))
    }
}
