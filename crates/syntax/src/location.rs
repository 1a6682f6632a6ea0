use serde::Serialize;
use std::fmt;

/// A 1-based row/column pair. Every character, tabs included, is one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl Position {
    pub const START: Position = Position { row: 1, col: 1 };

    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Translate a position measured from the start of a snippet into the
    /// coordinates of the text the snippet was cut from.
    pub fn relative_to(self, origin: Position) -> Position {
        if self.row == 1 {
            Position {
                row: origin.row,
                col: origin.col + self.col - 1,
            }
        } else {
            Position {
                row: origin.row + self.row - 1,
                col: self.col,
            }
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

/// A position inside a named source (a module file name or `selection`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: String,
    pub row: u32,
    pub col: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, position: Position) -> Self {
        Self {
            file: file.into(),
            row: position.row,
            col: position.col,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "{}:{}", self.row, self.col)
        } else {
            write!(f, "{}:{}", self.file, self.row)
        }
    }
}
