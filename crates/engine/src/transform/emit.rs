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

//! Recursive emission of instrumented source text.
//!
//! Each node either re-emits as a rewritten form wrapping instrumented
//! sub-emissions in reporter calls, or is copied verbatim from the
//! original text by span. Rewrites preserve evaluation order, receiver
//! identity of method calls, and short-circuiting; loops desugar so
//! their tests and updates report on every iteration.

use klve_common::{Detail, Phase};
use swc_core::common::Spanned;
use swc_core::ecma::ast as js;

use super::{detail, scope, scope::Scope, Transformer};

impl Transformer<'_> {
    pub(crate) fn emit_script(&mut self, script: &js::Script) -> String {
        let mut bindings = Vec::new();
        scope::hoisted_bindings(&script.body, &mut bindings);
        scope::lexical_bindings(&script.body, &mut bindings);
        self.with_scope(Scope::original(bindings), |t| t.emit_stmts(&script.body))
    }

    fn emit_stmts(&mut self, stmts: &[js::Stmt]) -> String {
        let mut out = String::new();
        for stmt in stmts {
            out.push_str(&self.emit_stmt(stmt));
            out.push('\n');
        }
        out
    }

    fn emit_stmt(&mut self, stmt: &js::Stmt) -> String {
        match stmt {
            js::Stmt::Expr(expr_stmt) => self.emit_expr_stmt(expr_stmt),
            js::Stmt::Decl(js::Decl::Fn(fn_decl)) => {
                // Hoisted; the declaration itself is not an event, but its
                // body is instrumented for when it runs.
                self.emit_function(Some(&fn_decl.ident), &fn_decl.function)
            }
            js::Stmt::Decl(js::Decl::Var(var_decl)) => self.emit_var_decl(var_decl, true),
            js::Stmt::Decl(js::Decl::Class(_)) => self.sliced_stmt(stmt, "ClassDeclaration"),
            js::Stmt::Decl(_) => self.slice(stmt.span()).to_string(),
            js::Stmt::Return(ret) => self.emit_return(ret),
            js::Stmt::If(if_stmt) => self.emit_if(if_stmt),
            js::Stmt::While(while_stmt) => self.emit_while(while_stmt),
            js::Stmt::DoWhile(do_while) => self.emit_do_while(do_while),
            js::Stmt::For(for_stmt) => self.emit_for(for_stmt),
            js::Stmt::ForIn(for_in) => self.emit_for_head_loop(
                "ForInStatement",
                for_in.span,
                &for_in.left,
                "in",
                &for_in.right,
                &for_in.body,
                false,
            ),
            js::Stmt::ForOf(for_of) => self.emit_for_head_loop(
                "ForOfStatement",
                for_of.span,
                &for_of.left,
                "of",
                &for_of.right,
                &for_of.body,
                for_of.is_await,
            ),
            js::Stmt::Try(try_stmt) => self.emit_try(try_stmt),
            js::Stmt::Throw(throw_stmt) => {
                let meta = self.stmt_meta("ThrowStatement", throw_stmt.span, Detail::Unknown);
                let arg = self.emit_expr(&throw_stmt.arg, false);
                self.bracketed(&meta, format!("throw {arg};"))
            }
            js::Stmt::Break(_) => self.sliced_stmt(stmt, "BreakStatement"),
            js::Stmt::Continue(_) => self.sliced_stmt(stmt, "ContinueStatement"),
            js::Stmt::Block(block) => self.emit_block(block),
            js::Stmt::Empty(_) => ";".to_string(),
            js::Stmt::Labeled(_) => self.sliced_stmt(stmt, "LabeledStatement"),
            js::Stmt::Switch(_) => self.sliced_stmt(stmt, "SwitchStatement"),
            js::Stmt::With(_) => self.sliced_stmt(stmt, "WithStatement"),
            js::Stmt::Debugger(_) => self.sliced_stmt(stmt, "DebuggerStatement"),
        }
    }

    /// A statement kept verbatim but still bracketed by its events.
    fn sliced_stmt(&mut self, stmt: &js::Stmt, node_type: &str) -> String {
        let meta = self.stmt_meta(node_type, stmt.span(), Detail::Unknown);
        self.bracketed(&meta, self.slice(stmt.span()).to_string())
    }

    fn emit_expr_stmt(&mut self, expr_stmt: &js::ExprStmt) -> String {
        // Directive prologues ("use strict") must stay string literals.
        if matches!(&*expr_stmt.expr, js::Expr::Lit(js::Lit::Str(_))) {
            return format!("{};", self.slice(expr_stmt.expr.span()));
        }
        let meta = self.stmt_meta("ExpressionStatement", expr_stmt.span, Detail::Evaluate);
        let inner = self.emit_expr(&expr_stmt.expr, false);
        self.bracketed(&meta, format!("{inner};"))
    }

    fn emit_var_decl(&mut self, decl: &js::VarDecl, with_reports: bool) -> String {
        let kind = match decl.kind {
            js::VarDeclKind::Var => "var",
            js::VarDeclKind::Let => "let",
            js::VarDeclKind::Const => "const",
        };
        let mut declarators = Vec::with_capacity(decl.decls.len());
        for declarator in &decl.decls {
            let name = self.slice(declarator.name.span()).to_string();
            match &declarator.init {
                Some(init) => {
                    let init = self.emit_expr(init, false);
                    declarators.push(format!("{name} = {init}"));
                }
                None => declarators.push(name),
            }
        }
        let body = format!("{kind} {};", declarators.join(", "));
        if with_reports {
            let meta =
                self.stmt_meta("VariableDeclaration", decl.span, detail::declaration_detail(decl));
            self.bracketed(&meta, body)
        } else {
            body
        }
    }

    fn emit_return(&mut self, ret: &js::ReturnStmt) -> String {
        let meta = self.stmt_meta("ReturnStatement", ret.span, Detail::Unknown);
        let before = self.statement_report(&meta, Phase::Before);
        let value = match &ret.arg {
            Some(arg) => self.emit_expr(arg, false),
            None => "void 0".to_string(),
        };
        let ns = self.ns().to_string();
        let after = self.value_report(&format!("{ns}.return"), &meta);
        format!("{before} {ns}.return = {value}; {after} return {ns}.return;")
    }

    fn emit_if(&mut self, if_stmt: &js::IfStmt) -> String {
        let meta = self.stmt_meta(
            "IfStatement",
            if_stmt.span,
            Detail::Branch { has_alternate: if_stmt.alt.is_some() },
        );
        let test = self.emit_expr(&if_stmt.test, false);
        let cons = self.emit_stmt_as_block(&if_stmt.cons);
        let body = match &if_stmt.alt {
            Some(alt) => {
                let alt = self.emit_stmt_as_block(alt);
                format!("if ({test}) {cons} else {alt}")
            }
            None => format!("if ({test}) {cons}"),
        };
        self.bracketed(&meta, body)
    }

    fn emit_while(&mut self, while_stmt: &js::WhileStmt) -> String {
        let meta = self.stmt_meta(
            "WhileStatement",
            while_stmt.span,
            Detail::Loop { has_init: None, has_test: None, has_update: None },
        );
        let slot = self.next_cache_slot();
        let ns = self.ns().to_string();
        let body = self.with_scope(Scope::synthetic(), |t| {
            let test = t.emit_expr(&while_stmt.test, true);
            let loop_body = t.emit_stmt_as_block(&while_stmt.body);
            format!(
                "while (true) {{ {ns}.cache[{slot}] = {test}; if (!{ns}.cache[{slot}]) break; {loop_body} }}"
            )
        });
        self.bracketed(&meta, body)
    }

    fn emit_do_while(&mut self, do_while: &js::DoWhileStmt) -> String {
        let meta = self.stmt_meta(
            "DoWhileStatement",
            do_while.span,
            Detail::Loop { has_init: None, has_test: None, has_update: None },
        );
        let body = self.emit_stmt_as_block(&do_while.body);
        let test = self.emit_expr(&do_while.test, false);
        self.bracketed(&meta, format!("do {body} while ({test});"))
    }

    fn emit_for(&mut self, for_stmt: &js::ForStmt) -> String {
        let meta = self.stmt_meta(
            "ForStatement",
            for_stmt.span,
            Detail::Loop {
                has_init: Some(for_stmt.init.is_some()),
                has_test: Some(for_stmt.test.is_some()),
                has_update: Some(for_stmt.update.is_some()),
            },
        );
        let slot = self.next_cache_slot();
        let ns = self.ns().to_string();

        // The wrapper block owns the init's lexical bindings.
        let mut wrapper_bindings = Vec::new();
        if let Some(js::VarDeclOrExpr::VarDecl(decl)) = &for_stmt.init {
            if decl.kind != js::VarDeclKind::Var {
                for declarator in &decl.decls {
                    scope::pat_names(&declarator.name, &mut wrapper_bindings);
                }
            }
        }

        let body = self.with_scope(Scope::original(wrapper_bindings), |t| {
            let init = match &for_stmt.init {
                Some(js::VarDeclOrExpr::VarDecl(decl)) => t.emit_var_decl(decl, true),
                Some(js::VarDeclOrExpr::Expr(expr)) => {
                    let meta = t.stmt_meta("ExpressionStatement", expr.span(), Detail::Evaluate);
                    let inner = t.emit_expr(expr, false);
                    t.bracketed(&meta, format!("{inner};"))
                }
                None => "null;".to_string(),
            };
            let inner = t.with_scope(Scope::synthetic(), |t| {
                let guard = match &for_stmt.test {
                    Some(test) => {
                        let test = t.emit_expr(test, true);
                        format!("{ns}.cache[{slot}] = {test}; if (!{ns}.cache[{slot}]) break;")
                    }
                    None => "null;".to_string(),
                };
                let loop_body = t.emit_stmt_as_block(&for_stmt.body);
                let update = match &for_stmt.update {
                    Some(update) => format!("{};", t.emit_expr(update, true)),
                    None => "null;".to_string(),
                };
                format!("while (true) {{ {guard} {loop_body} {update} }}")
            });
            format!("{{ {init} {inner} }}")
        });
        self.bracketed(&meta, body)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_for_head_loop(
        &mut self,
        node_type: &str,
        span: swc_core::common::Span,
        left: &js::ForHead,
        keyword: &str,
        right: &js::Expr,
        body: &js::Stmt,
        is_await: bool,
    ) -> String {
        let meta = self.stmt_meta(node_type, span, Detail::Unknown);
        let left_code = self.slice(left.span()).to_string();
        let mut bindings = Vec::new();
        if let js::ForHead::VarDecl(decl) = left {
            for declarator in &decl.decls {
                scope::pat_names(&declarator.name, &mut bindings);
            }
        }
        let right_code = self.emit_expr(right, false);
        let body_code =
            self.with_scope(Scope::original(bindings), |t| t.emit_stmt_as_block(body));
        let awaited = if is_await { " await" } else { "" };
        self.bracketed(
            &meta,
            format!("for{awaited} ({left_code} {keyword} {right_code}) {body_code}"),
        )
    }

    fn emit_try(&mut self, try_stmt: &js::TryStmt) -> String {
        let meta = self.stmt_meta(
            "TryStatement",
            try_stmt.span,
            Detail::Protect {
                has_catch: try_stmt.handler.is_some(),
                has_finally: try_stmt.finalizer.is_some(),
            },
        );
        let mut body = format!("try {}", self.emit_block(&try_stmt.block));
        if let Some(handler) = &try_stmt.handler {
            let mut bindings = Vec::new();
            if let Some(param) = &handler.param {
                scope::pat_names(param, &mut bindings);
            }
            let param_code = match &handler.param {
                Some(param) => format!(" ({})", self.slice(param.span())),
                None => String::new(),
            };
            let catch_body =
                self.with_scope(Scope::original(bindings), |t| t.emit_block(&handler.body));
            body.push_str(&format!(" catch{param_code} {catch_body}"));
        }
        if let Some(finalizer) = &try_stmt.finalizer {
            body.push_str(&format!(" finally {}", self.emit_block(finalizer)));
        }
        self.bracketed(&meta, body)
    }

    fn emit_block(&mut self, block: &js::BlockStmt) -> String {
        let mut bindings = Vec::new();
        scope::lexical_bindings(&block.stmts, &mut bindings);
        self.with_scope(Scope::original(bindings), |t| {
            format!("{{\n{}}}", t.emit_stmts(&block.stmts))
        })
    }

    /// Single-statement bodies of `if`/`else` and loops are wrapped into
    /// blocks so sibling reports have somewhere to live.
    fn emit_stmt_as_block(&mut self, stmt: &js::Stmt) -> String {
        match stmt {
            js::Stmt::Block(block) => self.emit_block(block),
            other => {
                let inner = self.emit_stmt(other);
                format!("{{ {inner} }}")
            }
        }
    }

    pub(crate) fn emit_function(
        &mut self,
        ident: Option<&js::Ident>,
        function: &js::Function,
    ) -> String {
        let keyword = match (function.is_async, function.is_generator) {
            (true, true) => "async function*",
            (true, false) => "async function",
            (false, true) => "function*",
            (false, false) => "function",
        };
        let name = ident.map(|ident| format!(" {}", ident.sym)).unwrap_or_default();
        format!("{keyword}{name}{}", self.emit_function_tail(function))
    }

    fn emit_function_tail(&mut self, function: &js::Function) -> String {
        let params: Vec<String> =
            function.params.iter().map(|param| self.slice(param.pat.span()).to_string()).collect();
        let param_pats: Vec<&js::Pat> = function.params.iter().map(|param| &param.pat).collect();
        let body = match &function.body {
            Some(body) => {
                let bindings = scope::function_scope_bindings(&param_pats, Some(body));
                self.with_scope(Scope::original(bindings), |t| {
                    format!("{{\n{}}}", t.emit_stmts(&body.stmts))
                })
            }
            None => "{}".to_string(),
        };
        format!("({}) {body}", params.join(", "))
    }

    pub(crate) fn emit_expr(&mut self, expr: &js::Expr, report_before: bool) -> String {
        match expr {
            js::Expr::Lit(lit) => self.emit_lit(lit, report_before),
            js::Expr::Ident(ident) => self.emit_ident_read(ident, report_before),
            js::Expr::Paren(paren) => format!("({})", self.emit_expr(&paren.expr, report_before)),
            js::Expr::Array(array) => self.emit_array(array, report_before),
            js::Expr::Object(object) => self.emit_object(object, report_before),
            js::Expr::Fn(fn_expr) => self.emit_fn_expr(fn_expr, report_before),
            js::Expr::Arrow(arrow) => self.emit_arrow(arrow, report_before),
            js::Expr::Unary(unary) => self.emit_unary(unary, report_before),
            js::Expr::Update(update) => self.emit_update(update, report_before),
            js::Expr::Bin(binary) => self.emit_binary(binary, report_before),
            js::Expr::Assign(assign) => self.emit_assign(assign, report_before),
            js::Expr::Member(member) => self.emit_member(member, report_before),
            js::Expr::Cond(cond) => self.emit_cond(cond, report_before),
            js::Expr::Call(call) => self.emit_call(call, report_before),
            js::Expr::New(new_expr) => self.emit_new(new_expr, report_before),
            js::Expr::Seq(seq) => self.emit_seq(seq, report_before),
            js::Expr::Tpl(tpl) => self.emit_tpl(tpl),
            js::Expr::OptChain(chain) => self.emit_opt_chain(chain, report_before),
            js::Expr::Await(await_expr) => {
                format!("await {}", self.emit_expr(&await_expr.arg, false))
            }
            js::Expr::Yield(yield_expr) => self.emit_yield(yield_expr),
            // Classes, tagged templates, regexes, and the long tail keep
            // their original text.
            _ => self.slice(expr.span()).to_string(),
        }
    }

    fn emit_lit(&mut self, lit: &js::Lit, report_before: bool) -> String {
        let node_type = match lit {
            js::Lit::Num(_) => "NumericLiteral",
            js::Lit::Str(_) => "StringLiteral",
            js::Lit::Bool(_) => "BooleanLiteral",
            // `null` doubles as the rewrite's own no-op filler and is
            // not an event; regexes and bigints pass through.
            _ => return self.slice(lit.span()).to_string(),
        };
        let meta = self.expr_meta(
            node_type,
            lit.span(),
            Detail::Literal { element_count: None, property_count: None },
        );
        self.report_wrapped(self.slice(lit.span()), &meta, report_before)
    }

    fn emit_ident_read(&mut self, ident: &js::Ident, report_before: bool) -> String {
        let meta = self.expr_meta(
            "Identifier",
            ident.span,
            Detail::Read { name: ident.sym.to_string() },
        );
        self.report_wrapped(&ident.sym, &meta, report_before)
    }

    fn emit_array(&mut self, array: &js::ArrayLit, report_before: bool) -> String {
        let elements: Vec<String> = array
            .elems
            .iter()
            .map(|element| match element {
                Some(element) => self.emit_expr_or_spread(element),
                None => String::new(),
            })
            .collect();
        let mut inner = format!("[{}]", elements.join(", "));
        if matches!(array.elems.last(), Some(None)) {
            // keep a trailing hole's contribution to length
            inner = format!("[{},]", elements.join(", "));
        }
        let meta = self.expr_meta(
            "ArrayExpression",
            array.span,
            Detail::Literal { element_count: Some(array.elems.len()), property_count: None },
        );
        self.report_wrapped(&inner, &meta, report_before)
    }

    fn emit_object(&mut self, object: &js::ObjectLit, report_before: bool) -> String {
        let props: Vec<String> = object.props.iter().map(|prop| self.emit_prop(prop)).collect();
        let meta = self.expr_meta(
            "ObjectExpression",
            object.span,
            Detail::Literal { element_count: None, property_count: Some(object.props.len()) },
        );
        self.report_wrapped(&format!("{{ {} }}", props.join(", ")), &meta, report_before)
    }

    fn emit_prop(&mut self, prop: &js::PropOrSpread) -> String {
        match prop {
            js::PropOrSpread::Spread(spread) => {
                format!("...{}", self.emit_expr(&spread.expr, false))
            }
            js::PropOrSpread::Prop(prop) => match &**prop {
                js::Prop::Shorthand(ident) => {
                    format!("{}: {}", ident.sym, self.emit_ident_read(ident, false))
                }
                js::Prop::KeyValue(kv) => {
                    let key = self.emit_prop_name(&kv.key);
                    format!("{key}: {}", self.emit_expr(&kv.value, false))
                }
                js::Prop::Method(method) => {
                    let modifier = match (method.function.is_async, method.function.is_generator) {
                        (true, true) => "async *",
                        (true, false) => "async ",
                        (false, true) => "*",
                        (false, false) => "",
                    };
                    let key = self.emit_prop_name(&method.key);
                    format!("{modifier}{key}{}", self.emit_function_tail(&method.function))
                }
                js::Prop::Getter(getter) => {
                    let key = self.emit_prop_name(&getter.key);
                    let body = match &getter.body {
                        Some(body) => {
                            let bindings = scope::function_scope_bindings(&[], Some(body));
                            self.with_scope(Scope::original(bindings), |t| {
                                format!("{{\n{}}}", t.emit_stmts(&body.stmts))
                            })
                        }
                        None => "{}".to_string(),
                    };
                    format!("get {key}() {body}")
                }
                js::Prop::Setter(setter) => {
                    let key = self.emit_prop_name(&setter.key);
                    let param = self.slice(setter.param.span()).to_string();
                    let body = match &setter.body {
                        Some(body) => {
                            let param_pats: Vec<&js::Pat> = vec![&setter.param];
                            let bindings = scope::function_scope_bindings(&param_pats, Some(body));
                            self.with_scope(Scope::original(bindings), |t| {
                                format!("{{\n{}}}", t.emit_stmts(&body.stmts))
                            })
                        }
                        None => "{}".to_string(),
                    };
                    format!("set {key}({param}) {body}")
                }
                js::Prop::Assign(_) => self.slice(prop.span()).to_string(),
            },
        }
    }

    fn emit_prop_name(&mut self, name: &js::PropName) -> String {
        match name {
            js::PropName::Computed(computed) => {
                format!("[{}]", self.emit_expr(&computed.expr, false))
            }
            _ => self.slice(name.span()).to_string(),
        }
    }

    fn emit_fn_expr(&mut self, fn_expr: &js::FnExpr, report_before: bool) -> String {
        let function = &fn_expr.function;
        let meta = self.expr_meta(
            "FunctionExpression",
            function.span,
            Detail::Define {
                name: fn_expr.ident.as_ref().map(|ident| ident.sym.to_string()),
                arity: function.params.len(),
                expression_body: None,
                is_async: function.is_async.then_some(true),
                generator: function.is_generator.then_some(true),
            },
        );
        let code = self.emit_function(fn_expr.ident.as_ref(), function);
        self.report_wrapped(&format!("({code})"), &meta, report_before)
    }

    fn emit_arrow(&mut self, arrow: &js::ArrowExpr, report_before: bool) -> String {
        let meta = self.expr_meta(
            "ArrowFunctionExpression",
            arrow.span,
            Detail::Define {
                name: None,
                arity: arrow.params.len(),
                expression_body: Some(matches!(&*arrow.body, js::BlockStmtOrExpr::Expr(_))),
                is_async: arrow.is_async.then_some(true),
                generator: None,
            },
        );
        let params: Vec<String> =
            arrow.params.iter().map(|param| self.slice(param.span()).to_string()).collect();
        let param_pats: Vec<&js::Pat> = arrow.params.iter().collect();
        let body = match &*arrow.body {
            js::BlockStmtOrExpr::BlockStmt(block) => {
                let bindings = scope::function_scope_bindings(&param_pats, Some(block));
                self.with_scope(Scope::original(bindings), |t| {
                    format!("{{\n{}}}", t.emit_stmts(&block.stmts))
                })
            }
            js::BlockStmtOrExpr::Expr(expr) => {
                let bindings = scope::function_scope_bindings(&param_pats, None);
                self.with_scope(Scope::original(bindings), |t| {
                    format!("{{ return {}; }}", t.emit_expr(expr, false))
                })
            }
        };
        // A bound regular function keeps the defining `this` while the
        // body still gets statement-level instrumentation when invoked.
        let keyword = if arrow.is_async { "async function" } else { "function" };
        let inner = format!("({keyword} ({}) {body}).bind(this)", params.join(", "));
        self.report_wrapped(&inner, &meta, report_before)
    }

    fn emit_unary(&mut self, unary: &js::UnaryExpr, report_before: bool) -> String {
        let op = detail::unary_op_str(unary.op);
        // Instrumenting these operands would change behavior: a guarded
        // read under `typeof`, and the deletion target under `delete`.
        let arg = match unary.op {
            js::UnaryOp::TypeOf if matches!(&*unary.arg, js::Expr::Ident(_)) => {
                self.slice(unary.arg.span()).to_string()
            }
            js::UnaryOp::Delete => self.slice(unary.arg.span()).to_string(),
            _ => self.emit_expr(&unary.arg, false),
        };
        let spacer = if op.chars().all(|c| c.is_ascii_alphabetic()) { " " } else { "" };
        let meta = self.expr_meta(
            "UnaryExpression",
            unary.span,
            Detail::Compute { operator: Some(op.to_string()), prefix: Some(true) },
        );
        self.report_wrapped(&format!("{op}{spacer}{arg}"), &meta, report_before)
    }

    fn emit_update(&mut self, update: &js::UpdateExpr, report_before: bool) -> String {
        let op = match update.op {
            js::UpdateOp::PlusPlus => "++",
            js::UpdateOp::MinusMinus => "--",
        };
        let sign = if update.op == js::UpdateOp::PlusPlus { "+" } else { "-" };
        let target = self.slice(update.arg.span()).to_string();
        let target_name = match &*update.arg {
            js::Expr::Ident(ident) => Some(ident.sym.to_string()),
            _ => None,
        };
        let meta = self.expr_meta(
            "UpdateExpression",
            update.span,
            Detail::Update { operator: op.to_string(), prefix: update.prefix, target: target_name },
        );
        let ns = self.ns().to_string();
        let scopes = self.scope_snapshot();
        let after = meta.to_js_literal();
        let core = if update.prefix {
            format!("({target} = {target} {sign} 1, {ns}.report({target}, {after}, {scopes}))")
        } else {
            // report the stashed pre-update value
            let slot = self.next_cache_slot();
            format!(
                "({ns}.cache[{slot}] = {target}, {target} = {target} {sign} 1, {ns}.report({ns}.cache[{slot}], {after}, {scopes}))"
            )
        };
        if report_before {
            let before = meta.with_time(Phase::Before).to_js_literal();
            format!("({ns}.report(void 0, {before}, {scopes}), {core})")
        } else {
            core
        }
    }

    fn emit_binary(&mut self, binary: &js::BinExpr, report_before: bool) -> String {
        let op = detail::binary_op_str(binary.op);
        let node_type =
            if detail::is_logical_op(binary.op) { "LogicalExpression" } else { "BinaryExpression" };
        let left = self.emit_expr(&binary.left, false);
        let right = self.emit_expr(&binary.right, false);
        let meta = self.expr_meta(
            node_type,
            binary.span,
            Detail::Compute { operator: Some(op.to_string()), prefix: None },
        );
        self.report_wrapped(&format!("{left} {op} {right}"), &meta, report_before)
    }

    fn emit_assign(&mut self, assign: &js::AssignExpr, report_before: bool) -> String {
        let op = detail::assign_op_str(assign.op);
        let (target_code, target_name) = match &assign.left {
            js::AssignTarget::Simple(js::SimpleAssignTarget::Ident(binding)) => {
                (binding.id.sym.to_string(), Some(binding.id.sym.to_string()))
            }
            js::AssignTarget::Simple(js::SimpleAssignTarget::Member(member)) => {
                (self.emit_member_target(member), None)
            }
            other => (self.slice(other.span()).to_string(), None),
        };
        let right = self.emit_expr(&assign.right, false);
        let meta = self.expr_meta(
            "AssignmentExpression",
            assign.span,
            Detail::Assign { operator: op.to_string(), target: target_name },
        );
        self.report_wrapped(&format!("{target_code} {op} {right}"), &meta, report_before)
    }

    /// A member expression as an assignment target. The target subtree
    /// is not reported, except a computed property, which is an
    /// ordinary read.
    fn emit_member_target(&mut self, member: &js::MemberExpr) -> String {
        let object = self.slice(member.obj.span()).to_string();
        match &member.prop {
            js::MemberProp::Computed(computed) => {
                format!("{object}[{}]", self.emit_expr(&computed.expr, false))
            }
            prop => format!("{object}.{}", self.slice(prop.span())),
        }
    }

    fn emit_member(&mut self, member: &js::MemberExpr, report_before: bool) -> String {
        let object = self.emit_expr(&member.obj, false);
        let (code, detail) = match &member.prop {
            js::MemberProp::Computed(computed) => (
                format!("{object}[{}]", self.emit_expr(&computed.expr, false)),
                Detail::Access { computed: true, property: None, optional: None },
            ),
            js::MemberProp::Ident(name) => (
                format!("{object}.{}", name.sym),
                Detail::Access {
                    computed: false,
                    property: Some(name.sym.to_string()),
                    optional: None,
                },
            ),
            js::MemberProp::PrivateName(private) => (
                format!("{object}.#{}", private.name),
                Detail::Access {
                    computed: false,
                    property: Some(format!("#{}", private.name)),
                    optional: None,
                },
            ),
        };
        let meta = self.expr_meta("MemberExpression", member.span, detail);
        self.report_wrapped(&code, &meta, report_before)
    }

    fn emit_cond(&mut self, cond: &js::CondExpr, report_before: bool) -> String {
        let test = self.emit_expr(&cond.test, false);
        let cons = self.emit_expr(&cond.cons, false);
        let alt = self.emit_expr(&cond.alt, false);
        let meta = self.expr_meta(
            "ConditionalExpression",
            cond.span,
            Detail::Branch { has_alternate: true },
        );
        self.report_wrapped(&format!("{test} ? {cons} : {alt}"), &meta, report_before)
    }

    fn emit_call(&mut self, call: &js::CallExpr, report_before: bool) -> String {
        let arity = call.args.len();
        let ns = self.ns().to_string();
        let (inner, callee_name, method) = match &call.callee {
            js::Callee::Expr(callee) => match &**callee {
                js::Expr::Member(member) => {
                    // Stash the receiver so the method sees the right
                    // `this` without evaluating the object twice.
                    let slot = self.next_cache_slot();
                    let object = self.emit_expr(&member.obj, false);
                    let (prop_code, prop_name, computed) = match &member.prop {
                        js::MemberProp::Computed(computed) => {
                            (format!("[{}]", self.emit_expr(&computed.expr, false)), None, true)
                        }
                        js::MemberProp::Ident(name) => {
                            (format!(".{}", name.sym), Some(name.sym.to_string()), false)
                        }
                        js::MemberProp::PrivateName(private) => (
                            format!(".#{}", private.name),
                            Some(format!("#{}", private.name)),
                            false,
                        ),
                    };
                    let callee_meta = self.expr_meta(
                        "MemberExpression",
                        member.span,
                        Detail::Access { computed, property: prop_name.clone(), optional: None },
                    );
                    let callee_code = self.report_wrapped(
                        &format!("({ns}.cache[{slot}] = {object}, {ns}.cache[{slot}]{prop_code})"),
                        &callee_meta,
                        false,
                    );
                    let args = self.emit_args(&call.args);
                    let separator = if args.is_empty() { "" } else { ", " };
                    (
                        format!("{callee_code}.call({ns}.cache[{slot}]{separator}{args})"),
                        prop_name,
                        true,
                    )
                }
                _ => {
                    let callee_name = match &**callee {
                        js::Expr::Ident(ident) => Some(ident.sym.to_string()),
                        _ => None,
                    };
                    let callee_code = self.emit_expr(callee, false);
                    let args = self.emit_args(&call.args);
                    let separator = if args.is_empty() { "" } else { ", " };
                    (format!("{callee_code}.call(void 0{separator}{args})"), callee_name, false)
                }
            },
            // super(...) and import(...) keep their call shape
            other => {
                let args = self.emit_args(&call.args);
                (format!("{}({args})", self.slice(other.span())), None, false)
            }
        };
        let meta = self.expr_meta(
            "CallExpression",
            call.span,
            Detail::Call { arity, callee: callee_name, method },
        );
        self.report_wrapped(&inner, &meta, report_before)
    }

    fn emit_new(&mut self, new_expr: &js::NewExpr, report_before: bool) -> String {
        let args = match &new_expr.args {
            Some(args) => self.emit_args(args),
            None => String::new(),
        };
        let arity = new_expr.args.as_ref().map(Vec::len).unwrap_or(0);
        let (callee_name, method) = detail::callee_identity(&new_expr.callee);
        let callee = self.emit_expr(&new_expr.callee, false);
        let meta = self.expr_meta(
            "NewExpression",
            new_expr.span,
            Detail::Construct { arity, callee: callee_name, method },
        );
        self.report_wrapped(&format!("new ({callee})({args})"), &meta, report_before)
    }

    fn emit_seq(&mut self, seq: &js::SeqExpr, report_before: bool) -> String {
        let parts: Vec<String> =
            seq.exprs.iter().map(|expr| self.emit_expr(expr, false)).collect();
        let meta = self.expr_meta(
            "SequenceExpression",
            seq.span,
            Detail::Compute { operator: None, prefix: None },
        );
        self.report_wrapped(&format!("({})", parts.join(", ")), &meta, report_before)
    }

    fn emit_tpl(&mut self, tpl: &js::Tpl) -> String {
        let mut out = String::from("`");
        for (index, quasi) in tpl.quasis.iter().enumerate() {
            out.push_str(&quasi.raw);
            if let Some(expr) = tpl.exprs.get(index) {
                out.push_str("${");
                out.push_str(&self.emit_expr(expr, false));
                out.push('}');
            }
        }
        out.push('`');
        out
    }

    fn emit_opt_chain(&mut self, chain: &js::OptChainExpr, report_before: bool) -> String {
        // The chain itself reports; its interior stays verbatim so the
        // short-circuit holes behave exactly as written.
        let code = self.slice(chain.span).to_string();
        let (node_type, detail) = match &*chain.base {
            js::OptChainBase::Member(member) => {
                let (computed, property) = match &member.prop {
                    js::MemberProp::Computed(_) => (true, None),
                    js::MemberProp::Ident(name) => (false, Some(name.sym.to_string())),
                    js::MemberProp::PrivateName(private) => {
                        (false, Some(format!("#{}", private.name)))
                    }
                };
                (
                    "MemberExpression",
                    Detail::Access { computed, property, optional: Some(true) },
                )
            }
            js::OptChainBase::Call(opt_call) => (
                "CallExpression",
                Detail::Call { arity: opt_call.args.len(), callee: None, method: false },
            ),
        };
        let meta = self.expr_meta(node_type, chain.span, detail);
        self.report_wrapped(&code, &meta, report_before)
    }

    fn emit_yield(&mut self, yield_expr: &js::YieldExpr) -> String {
        let star = if yield_expr.delegate { "*" } else { "" };
        match &yield_expr.arg {
            Some(arg) => format!("yield{star} {}", self.emit_expr(arg, false)),
            None => "yield".to_string(),
        }
    }

    fn emit_expr_or_spread(&mut self, arg: &js::ExprOrSpread) -> String {
        let code = self.emit_expr(&arg.expr, false);
        if arg.spread.is_some() {
            format!("...{code}")
        } else {
            code
        }
    }

    fn emit_args(&mut self, args: &[js::ExprOrSpread]) -> String {
        let parts: Vec<String> = args.iter().map(|arg| self.emit_expr_or_spread(arg)).collect();
        parts.join(", ")
    }
}
