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

//! Transform-time scope tracking.
//!
//! The emitter maintains a stack of these frames while walking the
//! program; scope snapshots in the emitted code are generated from the
//! stack at each report site. Binding collection is approximate in
//! exactly one direction: a binding may be listed before its declaration
//! executes, which the guarded runtime reads turn into a missing entry
//! rather than an error.

use swc_core::ecma::ast as js;

/// One frame on the transform-time scope chain.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    /// Whether the frame corresponds to user-written code
    pub original: bool,
    /// Synthesized frames that must not appear in snapshots
    pub skip: bool,
    /// Binding names visible in this frame, in declaration order
    pub bindings: Vec<String>,
}

impl Scope {
    /// A frame for user-written code.
    pub fn original(bindings: Vec<String>) -> Self {
        Self { original: true, skip: false, bindings }
    }

    /// A frame synthesized by a rewrite; never snapshotted.
    pub fn synthetic() -> Self {
        Self { original: false, skip: true, bindings: Vec::new() }
    }
}

fn push_unique(out: &mut Vec<String>, name: String) {
    if !out.contains(&name) {
        out.push(name);
    }
}

/// Collect every name a binding pattern introduces.
pub(crate) fn pat_names(pat: &js::Pat, out: &mut Vec<String>) {
    match pat {
        js::Pat::Ident(binding) => push_unique(out, binding.id.sym.to_string()),
        js::Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pat_names(element, out);
            }
        }
        js::Pat::Rest(rest) => pat_names(&rest.arg, out),
        js::Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    js::ObjectPatProp::KeyValue(kv) => pat_names(&kv.value, out),
                    js::ObjectPatProp::Assign(assign) => {
                        push_unique(out, assign.key.id.sym.to_string())
                    }
                    js::ObjectPatProp::Rest(rest) => pat_names(&rest.arg, out),
                }
            }
        }
        js::Pat::Assign(assign) => pat_names(&assign.left, out),
        js::Pat::Expr(_) | js::Pat::Invalid(_) => {}
    }
}

/// Names bound lexically by the direct statements of a block: `let`,
/// `const`, class declarations, and function declarations.
pub(crate) fn lexical_bindings(stmts: &[js::Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            js::Stmt::Decl(js::Decl::Var(decl)) if decl.kind != js::VarDeclKind::Var => {
                for declarator in &decl.decls {
                    pat_names(&declarator.name, out);
                }
            }
            js::Stmt::Decl(js::Decl::Class(decl)) => push_unique(out, decl.ident.sym.to_string()),
            js::Stmt::Decl(js::Decl::Fn(decl)) => push_unique(out, decl.ident.sym.to_string()),
            _ => {}
        }
    }
}

/// Names hoisted to the nearest function (or program) scope: `var`
/// declarators and function declarations, gathered through nested
/// blocks but not through nested functions.
pub(crate) fn hoisted_bindings(stmts: &[js::Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        hoisted_in_stmt(stmt, out);
    }
}

fn hoisted_in_stmt(stmt: &js::Stmt, out: &mut Vec<String>) {
    match stmt {
        js::Stmt::Decl(js::Decl::Var(decl)) if decl.kind == js::VarDeclKind::Var => {
            for declarator in &decl.decls {
                pat_names(&declarator.name, out);
            }
        }
        js::Stmt::Decl(js::Decl::Fn(decl)) => push_unique(out, decl.ident.sym.to_string()),
        js::Stmt::Block(block) => hoisted_bindings(&block.stmts, out),
        js::Stmt::If(if_stmt) => {
            hoisted_in_stmt(&if_stmt.cons, out);
            if let Some(alt) = &if_stmt.alt {
                hoisted_in_stmt(alt, out);
            }
        }
        js::Stmt::While(while_stmt) => hoisted_in_stmt(&while_stmt.body, out),
        js::Stmt::DoWhile(do_while) => hoisted_in_stmt(&do_while.body, out),
        js::Stmt::For(for_stmt) => {
            if let Some(js::VarDeclOrExpr::VarDecl(decl)) = &for_stmt.init {
                if decl.kind == js::VarDeclKind::Var {
                    for declarator in &decl.decls {
                        pat_names(&declarator.name, out);
                    }
                }
            }
            hoisted_in_stmt(&for_stmt.body, out);
        }
        js::Stmt::ForIn(for_in) => {
            for_head_var_names(&for_in.left, out);
            hoisted_in_stmt(&for_in.body, out);
        }
        js::Stmt::ForOf(for_of) => {
            for_head_var_names(&for_of.left, out);
            hoisted_in_stmt(&for_of.body, out);
        }
        js::Stmt::Try(try_stmt) => {
            hoisted_bindings(&try_stmt.block.stmts, out);
            if let Some(handler) = &try_stmt.handler {
                hoisted_bindings(&handler.body.stmts, out);
            }
            if let Some(finalizer) = &try_stmt.finalizer {
                hoisted_bindings(&finalizer.stmts, out);
            }
        }
        js::Stmt::Labeled(labeled) => hoisted_in_stmt(&labeled.body, out),
        js::Stmt::Switch(switch) => {
            for case in &switch.cases {
                hoisted_bindings(&case.cons, out);
            }
        }
        _ => {}
    }
}

fn for_head_var_names(head: &js::ForHead, out: &mut Vec<String>) {
    if let js::ForHead::VarDecl(decl) = head {
        if decl.kind == js::VarDeclKind::Var {
            for declarator in &decl.decls {
                pat_names(&declarator.name, out);
            }
        }
    }
}

/// The single frame of a function scope: parameters plus hoisted and
/// body-level lexical names.
pub(crate) fn function_scope_bindings(
    params: &[&js::Pat],
    body: Option<&js::BlockStmt>,
) -> Vec<String> {
    let mut names = Vec::new();
    for param in params {
        pat_names(param, &mut names);
    }
    if let Some(body) = body {
        hoisted_bindings(&body.stmts, &mut names);
        lexical_bindings(&body.stmts, &mut names);
    }
    names
}
