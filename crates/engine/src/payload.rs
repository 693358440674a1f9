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

//! The wire format between the transformer and the reporter.
//!
//! The transformer computes everything static about a reported node at
//! transform time and embeds it into the instrumented source as a JSON
//! string literal. The reporter decodes that literal with serde and
//! never inspects the AST again.

use klve_common::{Detail, Phase, SourceLocation, StepCategory};
use serde::{Deserialize, Serialize};

/// Static metadata for one reporter call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StaticMeta {
    /// Statement or expression event
    pub category: StepCategory,
    /// AST node type name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Which side of the evaluation this call site reports
    pub time: Phase,
    /// Source span of the node
    pub loc: SourceLocation,
    /// Node-shaped detail
    pub detail: Detail,
}

impl StaticMeta {
    /// The same call-site metadata, re-phased. Loop tests and updates
    /// reuse one node for a before and an after report.
    pub fn with_time(&self, time: Phase) -> Self {
        Self { time, ..self.clone() }
    }

    /// Render as a JavaScript string literal holding the JSON encoding.
    pub fn to_js_literal(&self) -> String {
        let json = serde_json::to_string(self).expect("static meta is always serializable");
        serde_json::to_string(&json).expect("a string is always serializable")
    }
}
