//! Source position tracking shared by the expression tree and diagnostics.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceRange {
    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        SourceRange { start, end }
    }

    /// Construct a narrowed sub-range starting `start` columns into this
    /// range's first line and spanning `count` columns, so that the
    /// underlined region in a diagnostic matches the offending token rather
    /// than the whole expression. Mirrors spec.md §4.5's
    /// `create_sub_source_range(range, start, count)`.
    pub fn create_sub_source_range(&self, start: u32, count: u32) -> SourceRange {
        let line = self.start.line;
        SourceRange {
            start: SourcePosition {
                line,
                column: self.start.column + start,
            },
            end: SourcePosition {
                line,
                column: self.start.column + start + count,
            },
        }
    }
}

impl std::fmt::Display for SourceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.start.line, self.start.column
        )
    }
}
