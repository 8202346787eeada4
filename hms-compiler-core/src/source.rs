// Source location and span tracking for the Homescript compiler
//
// Homescript diagnostics routinely point across module boundaries (an
// import in `a.hms` can surface an error whose cause lives in `b.hms`),
// so every span carries the filename it belongs to alongside precise
// line/column/byte positions.

use serde::{Deserialize, Serialize};

/// A position inside a source file.
///
/// `line` and `column` are 1-based; `byte` is the 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub byte: u32,
}

impl Position {
    pub fn new(line: u32, column: u32, byte: u32) -> Self {
        Self { line, column, byte }
    }

    /// The position of the first byte of a file.
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            byte: 0,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A range of source text, inclusive of both endpoints at the token level.
///
/// A span with an empty `filename` is *synthetic*: it marks values the
/// analyzer fabricated (prelude symbols, recovery placeholders) and is
/// never used as the primary location of a diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(filename: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// A synthetic span: no filename, zeroed positions.
    pub fn synthetic() -> Self {
        Self {
            filename: String::new(),
            start: Position::start(),
            end: Position::start(),
        }
    }

    /// A span covering an entire file, anchored at its first byte.
    /// Used for module-level diagnostics such as a missing `main`.
    pub fn file(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            start: Position::start(),
            end: Position::start(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.filename.is_empty()
    }

    /// A span from the start of `self` to the end of `other`.
    /// Both spans must belong to the same file.
    pub fn until(&self, other: &Span) -> Span {
        Span {
            filename: self.filename.clone(),
            start: self.start,
            end: other.end,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.filename, self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until() {
        let a = Span::new("x.hms", Position::new(1, 1, 0), Position::new(1, 3, 2));
        let b = Span::new("x.hms", Position::new(2, 1, 4), Position::new(2, 5, 8));
        let merged = a.until(&b);
        assert_eq!(merged.start, a.start);
        assert_eq!(merged.end, b.end);
        assert_eq!(merged.filename, "x.hms");
    }

    #[test]
    fn test_synthetic() {
        assert!(Span::synthetic().is_synthetic());
        assert!(!Span::file("a.hms").is_synthetic());
    }

    #[test]
    fn test_wire_shape() {
        let span = Span::new("a.hms", Position::new(3, 7, 42), Position::new(3, 9, 44));
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["filename"], "a.hms");
        assert_eq!(json["start"]["line"], 3);
        assert_eq!(json["start"]["column"], 7);
        assert_eq!(json["start"]["byte"], 42);
        assert_eq!(json["end"]["column"], 9);
    }
}
