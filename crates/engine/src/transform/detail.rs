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

//! Static detail extraction, computed once at transform time and
//! embedded into the reporter payload.

use klve_common::Detail;
use swc_core::ecma::ast as js;

/// Detail for a variable declaration: its kind and the first
/// declarator's identifier, when it is a plain identifier.
pub(crate) fn declaration_detail(decl: &js::VarDecl) -> Detail {
    let kind = match decl.kind {
        js::VarDeclKind::Var => "var",
        js::VarDeclKind::Let => "let",
        js::VarDeclKind::Const => "const",
    };
    let target = decl.decls.first().and_then(|declarator| pattern_target(&declarator.name));
    Detail::Declare { kind: kind.to_string(), target }
}

/// The identifier a pattern binds, for plain identifier patterns.
pub(crate) fn pattern_target(pat: &js::Pat) -> Option<String> {
    match pat {
        js::Pat::Ident(binding) => Some(binding.id.sym.to_string()),
        _ => None,
    }
}

/// The statically-known name of a callee, plus whether the callee is a
/// member expression.
pub(crate) fn callee_identity(callee: &js::Expr) -> (Option<String>, bool) {
    match callee {
        js::Expr::Ident(ident) => (Some(ident.sym.to_string()), false),
        js::Expr::Member(member) => match &member.prop {
            js::MemberProp::Ident(name) => (Some(name.sym.to_string()), true),
            _ => (None, true),
        },
        js::Expr::Paren(paren) => callee_identity(&paren.expr),
        _ => (None, false),
    }
}

/// Source text of a binary operator.
pub(crate) fn binary_op_str(op: js::BinaryOp) -> &'static str {
    use js::BinaryOp::*;
    match op {
        EqEq => "==",
        NotEq => "!=",
        EqEqEq => "===",
        NotEqEq => "!==",
        Lt => "<",
        LtEq => "<=",
        Gt => ">",
        GtEq => ">=",
        LShift => "<<",
        RShift => ">>",
        ZeroFillRShift => ">>>",
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        BitOr => "|",
        BitXor => "^",
        BitAnd => "&",
        LogicalOr => "||",
        LogicalAnd => "&&",
        In => "in",
        InstanceOf => "instanceof",
        Exp => "**",
        NullishCoalescing => "??",
    }
}

/// Whether a binary operator is one of the short-circuiting logical
/// operators, which report under their own node type.
pub(crate) fn is_logical_op(op: js::BinaryOp) -> bool {
    matches!(
        op,
        js::BinaryOp::LogicalAnd | js::BinaryOp::LogicalOr | js::BinaryOp::NullishCoalescing
    )
}

/// Source text of an assignment operator.
pub(crate) fn assign_op_str(op: js::AssignOp) -> &'static str {
    use js::AssignOp::*;
    match op {
        Assign => "=",
        AddAssign => "+=",
        SubAssign => "-=",
        MulAssign => "*=",
        DivAssign => "/=",
        ModAssign => "%=",
        LShiftAssign => "<<=",
        RShiftAssign => ">>=",
        ZeroFillRShiftAssign => ">>>=",
        BitOrAssign => "|=",
        BitXorAssign => "^=",
        BitAndAssign => "&=",
        ExpAssign => "**=",
        AndAssign => "&&=",
        OrAssign => "||=",
        NullishAssign => "??=",
    }
}

/// Source text of a unary operator.
pub(crate) fn unary_op_str(op: js::UnaryOp) -> &'static str {
    use js::UnaryOp::*;
    match op {
        Minus => "-",
        Plus => "+",
        Bang => "!",
        Tilde => "~",
        TypeOf => "typeof",
        Void => "void",
        Delete => "delete",
    }
}
