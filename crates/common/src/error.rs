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

//! The tracer's error model.
//!
//! Every failure the tracer surfaces is one of four kinds, so callers
//! match on the classification instead of probing a message: the source
//! did not parse, the instrumented program threw, a configured ceiling
//! was hit, or the options were semantically inconsistent.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::SourceLocation;

/// Result alias used across the KLVE crates.
pub type Result<T, E = TraceError> = std::result::Result<T, E>;

/// Which configured ceiling a trace ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    /// The maximum number of collected steps
    Steps,
    /// The maximum wall-clock trace duration, in milliseconds
    Time,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steps => write!(f, "step"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// A failure surfaced by the tracer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    /// The source text is not valid JavaScript.
    #[error("parse error at {loc}: {message}")]
    Parse {
        /// The parser's diagnostic message
        message: String,
        /// Where parsing failed
        loc: SourceLocation,
    },

    /// The instrumented program threw during execution.
    #[error("runtime error at {loc}: {message}")]
    Runtime {
        /// The thrown error, rendered as a string
        message: String,
        /// Best-effort location of the failure
        loc: SourceLocation,
    },

    /// A configured step or time ceiling was hit while tracing.
    #[error("{kind} limit exceeded (observed {observed})")]
    LimitExceeded {
        /// Which ceiling was hit
        kind: LimitKind,
        /// The observed magnitude: collected step count, or elapsed
        /// milliseconds
        observed: f64,
    },

    /// The options document is semantically inconsistent.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// What is wrong with the options
        message: String,
    },
}

impl TraceError {
    /// Build a parse error, falling back to the start of the source
    /// when the parser reported no location.
    pub fn parse(message: impl Into<String>, loc: Option<SourceLocation>) -> Self {
        Self::Parse { message: message.into(), loc: loc.unwrap_or_else(SourceLocation::unknown) }
    }

    /// Build a runtime error with a best-effort location.
    pub fn runtime(message: impl Into<String>, loc: Option<SourceLocation>) -> Self {
        Self::Runtime { message: message.into(), loc: loc.unwrap_or_else(SourceLocation::unknown) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_defaults_to_source_start() {
        let error = TraceError::parse("unexpected token", None);
        match error {
            TraceError::Parse { loc, .. } => assert_eq!(loc, SourceLocation::unknown()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn display_includes_classification() {
        let error = TraceError::LimitExceeded { kind: LimitKind::Steps, observed: 5.0 };
        assert_eq!(error.to_string(), "step limit exceeded (observed 5)");

        let error = TraceError::runtime("boom", None);
        assert_eq!(error.to_string(), "runtime error at 1:0: boom");
    }
}
