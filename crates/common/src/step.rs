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

//! Trace steps and their static per-node detail.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{location::SourceLocation, value::DescribedValue};

/// One lexical frame of a scope snapshot: binding name to its described
/// value, in binding order (innermost frame last in the snapshot).
pub type ScopeFrame = IndexMap<String, DescribedValue>;

/// Which kind of event a step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    /// The single trace-start marker
    Init,
    /// An event on a statement
    Statement,
    /// An event on an expression
    Expression,
}

/// Whether the event was recorded before or after the node evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Recorded just before evaluation starts
    Before,
    /// Recorded once the value is known
    After,
}

/// Static, AST-derived metadata describing the node a step reports on.
/// Tagged by `action`, with per-node payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Detail {
    /// An identifier read
    Read {
        /// The identifier
        name: String,
    },
    /// A member access
    Access {
        /// Whether the property is computed (`o[p]` rather than `o.p`)
        computed: bool,
        /// The property name; `null` when computed
        #[serde(default)]
        property: Option<String>,
        /// Present and `true` for optional chains (`o?.p`)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        optional: Option<bool>,
    },
    /// An assignment
    Assign {
        /// The assignment operator (`=`, `+=`, …)
        operator: String,
        /// The target identifier; `null` for member or pattern targets
        #[serde(default)]
        target: Option<String>,
    },
    /// A `++`/`--` update
    Update {
        /// The update operator
        operator: String,
        /// Whether the operator is prefix
        prefix: bool,
        /// The target identifier; `null` for member targets
        #[serde(default)]
        target: Option<String>,
    },
    /// A variable declaration
    Declare {
        /// The declaration kind (`var`, `let`, `const`)
        kind: String,
        /// The first declarator's identifier; `null` for patterns
        #[serde(default)]
        target: Option<String>,
    },
    /// A function call
    Call {
        /// Number of arguments at the call site
        arity: usize,
        /// Callee or method name, when statically known
        #[serde(default)]
        callee: Option<String>,
        /// Whether the callee is a member expression
        method: bool,
    },
    /// A `new` expression
    Construct {
        /// Number of arguments at the construction site
        arity: usize,
        /// Constructor name, when statically known
        #[serde(default)]
        callee: Option<String>,
        /// Whether the callee is a member expression
        method: bool,
    },
    /// An operator application (binary, logical, unary, sequence)
    Compute {
        /// The operator, absent for sequence expressions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
        /// Present for unary operators
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<bool>,
    },
    /// An `if` statement or conditional expression
    #[serde(rename_all = "camelCase")]
    Branch {
        /// Whether an else/alternate arm exists
        has_alternate: bool,
    },
    /// A loop statement
    #[serde(rename_all = "camelCase")]
    Loop {
        /// `for` only: whether the init slot is present
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_init: Option<bool>,
        /// `for` only: whether the test slot is present
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_test: Option<bool>,
        /// `for` only: whether the update slot is present
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_update: Option<bool>,
    },
    /// A `try` statement
    #[serde(rename_all = "camelCase")]
    Protect {
        /// Whether a catch clause exists
        has_catch: bool,
        /// Whether a finally clause exists
        has_finally: bool,
    },
    /// A function or arrow definition
    #[serde(rename_all = "camelCase")]
    Define {
        /// Function name, for named function expressions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Declared parameter count
        arity: usize,
        /// Arrows only: whether the body is a bare expression
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expression_body: Option<bool>,
        /// Present and `true` for async functions
        #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
        is_async: Option<bool>,
        /// Present and `true` for generator functions
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generator: Option<bool>,
    },
    /// A literal (primitive, array, or object)
    #[serde(rename_all = "camelCase")]
    Literal {
        /// Array literals: number of elements
        #[serde(default, skip_serializing_if = "Option::is_none")]
        element_count: Option<usize>,
        /// Object literals: number of properties
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_count: Option<usize>,
    },
    /// A statement evaluated for effect (expression statements)
    Evaluate,
    /// A node with no dedicated detail shape
    Unknown,
}

impl Detail {
    /// The string-typed identifier names this detail mentions. These are
    /// the candidates the name filter matches against.
    pub fn name_candidates(&self) -> Vec<&str> {
        let mut names = Vec::new();
        match self {
            Self::Read { name } => names.push(name.as_str()),
            Self::Access { property, .. } => names.extend(property.as_deref()),
            Self::Assign { target, .. }
            | Self::Update { target, .. }
            | Self::Declare { target, .. } => names.extend(target.as_deref()),
            Self::Call { callee, .. } | Self::Construct { callee, .. } => {
                names.extend(callee.as_deref())
            }
            Self::Define { name, .. } => names.extend(name.as_deref()),
            _ => {}
        }
        names
    }
}

/// One entry in the output trace.
///
/// Fields other than `step` and `category` are optional: the init step
/// carries none of them, and the data filter may strip `scopes`,
/// `value`, `logs`, `dt`, and `loc` from the rest. Absent fields are
/// omitted from serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based ordinal after renumbering
    pub step: usize,
    /// Event category
    pub category: StepCategory,
    /// AST node type name; absent on init
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Event phase; absent on init
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Phase>,
    /// Wall-clock milliseconds since trace start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f64>,
    /// Source span of the reported node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
    /// Lexical scope snapshot, outermost frame first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<ScopeFrame>>,
    /// The observed value of the node at this phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<DescribedValue>,
    /// Console writes since the previous step, one entry per call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Vec<DescribedValue>>>,
    /// Static metadata about the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Detail>,
}

impl Step {
    /// The trace-start marker. Carries only its ordinal and category.
    pub fn init() -> Self {
        Self {
            step: 0,
            category: StepCategory::Init,
            node_type: None,
            time: None,
            dt: None,
            loc: None,
            scopes: None,
            value: None,
            logs: None,
            detail: None,
        }
    }

    /// Whether this is the trace-start marker.
    pub fn is_init(&self) -> bool {
        self.category == StepCategory::Init
    }
}
