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

//! Reporter call-site generation: metadata literals and scope
//! snapshots.
//!
//! Snapshots are emitted as an immediately-invoked arrow that rebuilds
//! the visible frames at runtime. Every binding read sits in its own
//! guard, so a read that throws (temporal dead zone, deleted global)
//! contributes no entry instead of aborting the snapshot.

use klve_common::{Detail, Phase, SourceLocation, StepCategory};
use swc_core::common::Span;

use super::{span_location, Transformer};
use crate::payload::StaticMeta;

impl Transformer<'_> {
    /// Call-site metadata for a node, phased `after` by default.
    pub(crate) fn make_meta(
        &self,
        category: StepCategory,
        node_type: &str,
        span: Span,
        detail: Detail,
    ) -> StaticMeta {
        StaticMeta {
            category,
            node_type: node_type.to_string(),
            time: Phase::After,
            loc: span_location(self.source_map(), span)
                .unwrap_or_else(SourceLocation::unknown),
            detail,
        }
    }

    pub(crate) fn expr_meta(&self, node_type: &str, span: Span, detail: Detail) -> StaticMeta {
        self.make_meta(StepCategory::Expression, node_type, span, detail)
    }

    pub(crate) fn stmt_meta(&self, node_type: &str, span: Span, detail: Detail) -> StaticMeta {
        self.make_meta(StepCategory::Statement, node_type, span, detail)
    }

    /// The runtime expression that snapshots the scope chain visible at
    /// this emission point: an array of frames, each an array of
    /// `[name, handle]` pairs, handed across the boundary as JSON text
    /// through the engine's own stringifier held on the namespace.
    pub(crate) fn scope_snapshot(&self) -> String {
        let ns = self.ns();
        let mut out = format!("(() => {{ const {ns}_f = []; var {ns}_s;");
        for scope in self.scopes().iter().filter(|scope| !scope.skip) {
            out.push_str(&format!(" {ns}_s = [];"));
            for name in &scope.bindings {
                let key = if scope.original { name.clone() } else { format!("{name} (!)") };
                let key_literal = serde_json::to_string(&key)
                    .expect("a binding name is always serializable");
                out.push_str(&format!(
                    " try {{ {ns}_s.push([{key_literal}, {ns}.describe({name})]); }} catch ({ns}_e) {{}}"
                ));
            }
            out.push_str(&format!(" {ns}_f.push({ns}_s);"));
        }
        out.push_str(&format!(" return {ns}.json({ns}_f); }})()"));
        out
    }

    /// Wrap an emitted expression in its reporter call, with an extra
    /// phased-before call when the node is a loop test or update.
    pub(crate) fn report_wrapped(
        &self,
        inner: &str,
        meta: &StaticMeta,
        with_before: bool,
    ) -> String {
        let ns = self.ns();
        let scopes = self.scope_snapshot();
        let after = meta.to_js_literal();
        if with_before {
            let before = meta.with_time(Phase::Before).to_js_literal();
            format!(
                "({ns}.report(void 0, {before}, {scopes}), {ns}.report({inner}, {after}, {scopes}))"
            )
        } else {
            format!("{ns}.report({inner}, {after}, {scopes})")
        }
    }

    /// A sibling statement reporting one phase of a statement node.
    pub(crate) fn statement_report(&self, meta: &StaticMeta, time: Phase) -> String {
        let literal = meta.with_time(time).to_js_literal();
        format!("{}.report(void 0, {literal}, {});", self.ns(), self.scope_snapshot())
    }

    /// A sibling statement reporting the `after` phase of a statement
    /// with an explicit observed value.
    pub(crate) fn value_report(&self, value: &str, meta: &StaticMeta) -> String {
        let literal = meta.to_js_literal();
        format!("{}.report({value}, {literal}, {});", self.ns(), self.scope_snapshot())
    }

    /// Sibling before/after reports around an emitted statement body.
    pub(crate) fn bracketed(&self, meta: &StaticMeta, body: String) -> String {
        format!(
            "{} {body} {}",
            self.statement_report(meta, Phase::Before),
            self.statement_report(meta, Phase::After)
        )
    }
}
