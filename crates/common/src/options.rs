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

//! Tracer options and the record configuration.
//!
//! Every field is optional on the wire and saturates to its default
//! during deserialization, so the filter always operates on a fully
//! populated record. Defaults keep everything: all node toggles on, both
//! phases on, all data fields on, no name restrictions.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, TraceError};

/// Toggles for literal nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteralNodes {
    /// Keep `NumericLiteral` steps
    pub numeric: bool,
    /// Keep `StringLiteral` steps
    pub string: bool,
    /// Keep `BooleanLiteral` steps
    pub boolean: bool,
    /// Keep `ArrayExpression` steps
    pub array: bool,
    /// Keep `ObjectExpression` steps
    pub object: bool,
}

impl Default for LiteralNodes {
    fn default() -> Self {
        Self { numeric: true, string: true, boolean: true, array: true, object: true }
    }
}

/// Toggles for value-reading nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadNodes {
    /// Keep `Identifier` steps
    pub identifier: bool,
    /// Keep `MemberExpression` steps
    pub member: bool,
}

impl Default for ReadNodes {
    fn default() -> Self {
        Self { identifier: true, member: true }
    }
}

/// Toggles for value-writing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteNodes {
    /// Keep `AssignmentExpression` steps
    pub assignment: bool,
    /// Keep `UpdateExpression` steps
    pub update: bool,
    /// Keep `VariableDeclaration` steps
    pub declaration: bool,
}

impl Default for WriteNodes {
    fn default() -> Self {
        Self { assignment: true, update: true, declaration: true }
    }
}

/// Toggles for call-like nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallNodes {
    /// Keep `CallExpression` steps
    pub call: bool,
    /// Keep `NewExpression` steps
    #[serde(rename = "new")]
    pub construct: bool,
}

impl Default for CallNodes {
    fn default() -> Self {
        Self { call: true, construct: true }
    }
}

/// Toggles for operator nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorNodes {
    /// Keep `BinaryExpression` steps
    pub binary: bool,
    /// Keep `LogicalExpression` steps
    pub logical: bool,
    /// Keep `UnaryExpression` steps
    pub unary: bool,
    /// Keep `SequenceExpression` steps
    pub sequence: bool,
}

impl Default for OperatorNodes {
    fn default() -> Self {
        Self { binary: true, logical: true, unary: true, sequence: true }
    }
}

/// Toggles for branching nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchNodes {
    /// Keep `IfStatement` steps
    #[serde(rename = "if")]
    pub if_statement: bool,
    /// Keep `ConditionalExpression` steps
    pub ternary: bool,
}

impl Default for BranchNodes {
    fn default() -> Self {
        Self { if_statement: true, ternary: true }
    }
}

/// Toggles for loop nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopNodes {
    /// Keep `ForStatement` steps
    #[serde(rename = "for")]
    pub for_statement: bool,
    /// Keep `WhileStatement` steps
    #[serde(rename = "while")]
    pub while_statement: bool,
}

impl Default for LoopNodes {
    fn default() -> Self {
        Self { for_statement: true, while_statement: true }
    }
}

/// Toggles for protected-region nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectNodes {
    /// Keep `TryStatement` steps
    #[serde(rename = "try")]
    pub try_statement: bool,
}

impl Default for ProtectNodes {
    fn default() -> Self {
        Self { try_statement: true }
    }
}

/// Toggles for function-defining nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionNodes {
    /// Keep `ArrowFunctionExpression` steps
    pub arrow: bool,
    /// Keep `FunctionExpression` steps
    pub expression: bool,
}

impl Default for FunctionNodes {
    fn default() -> Self {
        Self { arrow: true, expression: true }
    }
}

/// Identifier-name filtering. At most one of `include`/`exclude` may be
/// non-empty; [`verify_options`] enforces this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameFilterOptions {
    /// Keep only steps mentioning one of these names
    pub include: Vec<String>,
    /// Drop steps mentioning any of these names
    pub exclude: Vec<String>,
}

/// The resolved name-filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameFilterMode {
    /// Keep steps whose candidates intersect the include list
    Include,
    /// Keep steps whose candidates avoid the exclude list
    Exclude,
    /// No name restriction
    None,
}

impl NameFilterOptions {
    /// Resolve the active mode: a non-empty include list wins, else a
    /// non-empty exclude list, else no restriction.
    pub fn mode(&self) -> NameFilterMode {
        if !self.include.is_empty() {
            NameFilterMode::Include
        } else if !self.exclude.is_empty() {
            NameFilterMode::Exclude
        } else {
            NameFilterMode::None
        }
    }
}

/// Phase filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOptions {
    /// Keep `before` steps
    pub before: bool,
    /// Keep `after` steps
    pub after: bool,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self { before: true, after: true }
    }
}

/// Per-field data stripping for surviving steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    /// Keep scope snapshots
    pub scopes: bool,
    /// Keep observed values
    pub value: bool,
    /// Keep console output
    pub logs: bool,
    /// Keep elapsed-time stamps
    pub dt: bool,
    /// Keep source locations
    pub loc: bool,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self { scopes: true, value: true, logs: true, dt: true, loc: true }
    }
}

/// The filter section of the options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Identifier-name filtering
    pub names: NameFilterOptions,
    /// Phase filtering
    pub timing: TimingOptions,
    /// Data stripping
    pub data: DataOptions,
}

/// The full options document for one trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// Literal node toggles
    pub literals: LiteralNodes,
    /// Read node toggles
    pub reads: ReadNodes,
    /// Write node toggles
    pub writes: WriteNodes,
    /// Call node toggles
    pub calls: CallNodes,
    /// Operator node toggles
    pub operators: OperatorNodes,
    /// Branch node toggles
    pub branches: BranchNodes,
    /// Loop node toggles
    pub loops: LoopNodes,
    /// Protected-region node toggles
    pub protect: ProtectNodes,
    /// Function node toggles
    pub functions: FunctionNodes,
    /// Phase, name, and data filtering
    pub filter: FilterOptions,
}

/// Step and time ceilings for one trace. `None` disables a ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordLimits {
    /// Maximum number of collected steps, counting the init marker
    pub steps: Option<u64>,
    /// Maximum wall-clock trace duration, in milliseconds
    pub time: Option<u64>,
}

/// Host-provided metadata for one record invocation. Fields beyond the
/// limits are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMeta {
    /// Trace ceilings
    pub max: RecordLimits,
    /// Unrecognized metadata, carried but unused
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The full configuration for one record invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Host metadata, including limits
    pub meta: RecordMeta,
    /// Validated tracer options
    pub options: TraceOptions,
}

/// The JSON Schema (draft-07) describing [`TraceOptions`]. Every field
/// is optional; defaults keep everything.
pub fn options_schema() -> serde_json::Value {
    let toggle_group = |fields: &[&str]| {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": fields
                .iter()
                .map(|field| ((*field).to_string(), json!({"type": "boolean"})))
                .collect::<serde_json::Map<_, _>>(),
        })
    };
    let name_list = json!({"type": "array", "items": {"type": "string"}});

    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "JsKlveOptions",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "literals": toggle_group(&["numeric", "string", "boolean", "array", "object"]),
            "reads": toggle_group(&["identifier", "member"]),
            "writes": toggle_group(&["assignment", "update", "declaration"]),
            "calls": toggle_group(&["call", "new"]),
            "operators": toggle_group(&["binary", "logical", "unary", "sequence"]),
            "branches": toggle_group(&["if", "ternary"]),
            "loops": toggle_group(&["for", "while"]),
            "protect": toggle_group(&["try"]),
            "functions": toggle_group(&["arrow", "expression"]),
            "filter": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "names": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {"include": name_list.clone(), "exclude": name_list},
                    },
                    "timing": toggle_group(&["before", "after"]),
                    "data": toggle_group(&["scopes", "value", "logs", "dt", "loc"]),
                },
            },
        },
    })
}

/// Semantic validation beyond the schema: the include and exclude name
/// lists are mutually exclusive.
pub fn verify_options(options: &TraceOptions) -> Result<()> {
    if !options.filter.names.include.is_empty() && !options.filter.names.exclude.is_empty() {
        return Err(TraceError::InvalidOptions {
            message: "filter.names.include and filter.names.exclude are mutually exclusive"
                .to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_keep_everything() {
        let options = TraceOptions::default();
        assert!(options.literals.numeric);
        assert!(options.calls.construct);
        assert!(options.filter.timing.before && options.filter.timing.after);
        assert!(options.filter.data.scopes);
        assert_eq!(options.filter.names.mode(), NameFilterMode::None);
    }

    #[test]
    fn partial_document_saturates_to_defaults() {
        let options: TraceOptions =
            serde_json::from_str(r#"{"literals": {"numeric": false}}"#).unwrap();
        assert!(!options.literals.numeric);
        assert!(options.literals.string);
        assert!(options.reads.identifier);
    }

    #[test]
    fn keyword_fields_use_their_wire_names() {
        let options: TraceOptions = serde_json::from_str(
            r#"{"calls": {"new": false}, "loops": {"for": false}, "branches": {"if": false}, "protect": {"try": false}}"#,
        )
        .unwrap();
        assert!(!options.calls.construct);
        assert!(!options.loops.for_statement);
        assert!(!options.branches.if_statement);
        assert!(!options.protect.try_statement);
    }

    #[test]
    fn include_wins_mode_resolution() {
        let names = NameFilterOptions {
            include: vec!["x".to_string()],
            exclude: vec!["y".to_string()],
        };
        assert_eq!(names.mode(), NameFilterMode::Include);
    }

    #[test]
    fn verify_rejects_both_name_lists() {
        let mut options = TraceOptions::default();
        options.filter.names.include = vec!["x".to_string()];
        options.filter.names.exclude = vec!["y".to_string()];
        assert!(matches!(
            verify_options(&options),
            Err(TraceError::InvalidOptions { .. })
        ));
    }

    #[test]
    fn verify_accepts_single_name_list() {
        let mut options = TraceOptions::default();
        options.filter.names.include = vec!["x".to_string()];
        verify_options(&options).unwrap();
    }

    #[test]
    fn schema_is_draft_07() {
        let schema = options_schema();
        assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema#");
        assert!(schema["properties"]["filter"]["properties"]["data"]["properties"]["loc"]
            .is_object());
    }

    #[test]
    fn meta_ignores_unknown_fields() {
        let meta: RecordMeta =
            serde_json::from_str(r#"{"max": {"steps": 10}, "sessionId": "abc"}"#).unwrap();
        assert_eq!(meta.max.steps, Some(10));
        assert_eq!(meta.max.time, None);
        assert!(meta.extra.contains_key("sessionId"));
    }
}
