//! Language dialects and the keyword set each one enables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Keywords reserved in every dialect.
pub const KEYWORDS: &[&str] = &[
    "as", "default", "else", "false", "import", "not", "null", "package", "some", "true", "with",
];

/// Keywords that are opt-in under v0 and always on under v1.
pub const FUTURE_KEYWORDS: &[&str] = &["contains", "every", "if", "in"];

/// Language generation a module or query is parsed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Dialect {
    V0,
    #[default]
    V1,
}

impl Dialect {
    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            0 => Some(Dialect::V0),
            1 => Some(Dialect::V1),
            _ => None,
        }
    }

    pub fn version(self) -> u8 {
        match self {
            Dialect::V0 => 0,
            Dialect::V1 => 1,
        }
    }

    /// The generation a failed compile may be retried under.
    pub fn previous(self) -> Option<Dialect> {
        match self {
            Dialect::V0 => None,
            Dialect::V1 => Some(Dialect::V0),
        }
    }
}

impl From<Dialect> for u8 {
    fn from(dialect: Dialect) -> Self {
        dialect.version()
    }
}

impl TryFrom<u8> for Dialect {
    type Error = String;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        Dialect::from_version(version).ok_or_else(|| format!("unsupported rego version {version}"))
    }
}

/// Which words the outline treats as keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserOptions {
    pub dialect: Dialect,
    future_keywords: BTreeSet<&'static str>,
}

impl ParserOptions {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            future_keywords: BTreeSet::new(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_all_future_keywords(mut self) -> Self {
        self.future_keywords.extend(FUTURE_KEYWORDS);
        self
    }

    /// Enable one future keyword. Unknown words are ignored.
    pub fn with_future_keyword(mut self, keyword: &str) -> Self {
        if let Some(known) = FUTURE_KEYWORDS.iter().find(|k| **k == keyword) {
            self.future_keywords.insert(known);
        }
        self
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        if KEYWORDS.contains(&word) {
            return true;
        }
        FUTURE_KEYWORDS.contains(&word)
            && (self.dialect == Dialect::V1 || self.future_keywords.contains(word))
    }
}
