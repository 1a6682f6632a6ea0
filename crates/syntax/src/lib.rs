//! Lexical outline of Rego sources.
//!
//! This crate does not evaluate or type-check policy. It tokenizes sources,
//! splits them into top-level statements (package, import, rule, body), and
//! scans token streams for references. The playground runtime uses this to
//! classify selections, resolve query references and find unsafe calls.
//! Grammar is the engine's business: [`parse_statements`] runs each
//! statement through the `regorus` parser before it is used.
//!
//! # Example
//!
//! ```
//! use syntax::{Dialect, Module};
//!
//! let module = Module::parse("play.rego", "package play\n\nallow if input.ok", Dialect::V1).unwrap();
//! assert_eq!(module.package.path.to_string(), "data.play");
//! assert_eq!(module.rules[0].name, "allow");
//! ```

mod dialect;
mod error;
mod grammar;
mod location;
mod outline;
mod path;
mod refs;
mod token;

pub use dialect::{Dialect, FUTURE_KEYWORDS, KEYWORDS, ParserOptions};
pub use error::{Error, ErrorCode, Errors, Result};
pub use grammar::{Report, parse_statements};
pub use location::{Location, Position};
pub use outline::{Body, Expr, Import, Module, Outline, Package, Rule, Statement, outline};
pub use path::{Path, is_identifier};
pub use refs::{RefSpan, is_ref_head, refs};
pub use token::{Token, TokenKind, tokenize};
