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

//! The fixed node-type table: which options toggle governs each AST
//! type the instrumentation reports. Types outside the table (statement
//! events like `ExpressionStatement` or `ReturnStatement`) are always
//! kept.

use klve_common::TraceOptions;

/// All node types with a dedicated toggle, paired with their
/// configuration path.
pub(crate) const TOGGLED_TYPES: [(&str, &str); 23] = [
    ("NumericLiteral", "literals.numeric"),
    ("StringLiteral", "literals.string"),
    ("BooleanLiteral", "literals.boolean"),
    ("ArrayExpression", "literals.array"),
    ("ObjectExpression", "literals.object"),
    ("Identifier", "reads.identifier"),
    ("MemberExpression", "reads.member"),
    ("AssignmentExpression", "writes.assignment"),
    ("UpdateExpression", "writes.update"),
    ("VariableDeclaration", "writes.declaration"),
    ("CallExpression", "calls.call"),
    ("NewExpression", "calls.new"),
    ("BinaryExpression", "operators.binary"),
    ("LogicalExpression", "operators.logical"),
    ("UnaryExpression", "operators.unary"),
    ("SequenceExpression", "operators.sequence"),
    ("IfStatement", "branches.if"),
    ("ConditionalExpression", "branches.ternary"),
    ("ForStatement", "loops.for"),
    ("WhileStatement", "loops.while"),
    ("TryStatement", "protect.try"),
    ("ArrowFunctionExpression", "functions.arrow"),
    ("FunctionExpression", "functions.expression"),
];

/// Whether steps of the given node type survive under these options.
/// Unknown types default to keep.
pub(crate) fn node_enabled(options: &TraceOptions, node_type: &str) -> bool {
    match node_type {
        "NumericLiteral" => options.literals.numeric,
        "StringLiteral" => options.literals.string,
        "BooleanLiteral" => options.literals.boolean,
        "ArrayExpression" => options.literals.array,
        "ObjectExpression" => options.literals.object,
        "Identifier" => options.reads.identifier,
        "MemberExpression" => options.reads.member,
        "AssignmentExpression" => options.writes.assignment,
        "UpdateExpression" => options.writes.update,
        "VariableDeclaration" => options.writes.declaration,
        "CallExpression" => options.calls.call,
        "NewExpression" => options.calls.construct,
        "BinaryExpression" => options.operators.binary,
        "LogicalExpression" => options.operators.logical,
        "UnaryExpression" => options.operators.unary,
        "SequenceExpression" => options.operators.sequence,
        "IfStatement" => options.branches.if_statement,
        "ConditionalExpression" => options.branches.ternary,
        "ForStatement" => options.loops.for_statement,
        "WhileStatement" => options.loops.while_statement,
        "TryStatement" => options.protect.try_statement,
        "ArrowFunctionExpression" => options.functions.arrow,
        "FunctionExpression" => options.functions.expression,
        _ => true,
    }
}
