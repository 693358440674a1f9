// KLVE - JavaScript Execution Tracer
// Copyright (C) 2025 The KLVE authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Source positions attached to trace steps and errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single position in the source text. Lines are 1-indexed, columns
/// 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePos {
    /// 1-indexed line number
    pub line: usize,
    /// 0-indexed column number
    pub column: usize,
}

impl LinePos {
    /// Create a position from a line/column pair.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for LinePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The source span of a node, as a start/end position pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Start of the span (inclusive)
    pub start: LinePos,
    /// End of the span (exclusive)
    pub end: LinePos,
}

impl SourceLocation {
    /// Create a span from its endpoints.
    pub fn new(start: LinePos, end: LinePos) -> Self {
        Self { start, end }
    }

    /// The fallback location used when a failure carries no position of
    /// its own: the very beginning of the source.
    pub fn unknown() -> Self {
        Self { start: LinePos::new(1, 0), end: LinePos::new(1, 0) }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_location_is_line_one_column_zero() {
        let loc = SourceLocation::unknown();
        assert_eq!(loc.start, LinePos::new(1, 0));
        assert_eq!(loc.to_string(), "1:0");
    }

    #[test]
    fn serializes_as_nested_positions() {
        let loc = SourceLocation::new(LinePos::new(2, 4), LinePos::new(2, 9));
        let json = serde_json::to_value(loc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "start": {"line": 2, "column": 4},
                "end": {"line": 2, "column": 9},
            })
        );
    }
}
