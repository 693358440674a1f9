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

//! Source instrumentation.
//!
//! The transformer parses the input, then re-emits it as equivalent
//! source text with reporter calls interleaved around every expression
//! and statement. Nodes it does not instrument are copied verbatim from
//! the original text by byte span, so untouched constructs keep their
//! exact behavior.
//!
//! All helper calls in the emitted program go through a single reserved
//! namespace object, freshly named per invocation so it cannot collide
//! with user identifiers.

mod detail;
mod emit;
mod meta;
mod scope;

use klve_common::{LinePos, Result, SourceLocation, TraceError};
use swc_core::common::{sync::Lrc, BytePos, FileName, SourceFile, SourceMap, Span, Spanned};
use swc_core::ecma::ast as js;
use swc_core::ecma::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};
use tracing::debug;

use scope::Scope;

/// The result of instrumenting a source snippet.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// The instrumented source text
    pub code: String,
    /// The reserved namespace identifier the emitted code calls into
    pub ns: String,
}

/// Instrument a JavaScript snippet. The returned program behaves like
/// the input when executed in a frame providing the namespace object,
/// except that the reporter observes every sub-evaluation.
pub fn instrument(source: &str) -> Result<TransformOutput> {
    let cm: Lrc<SourceMap> = Default::default();
    let (fm, script) = parse_script(&cm, source)?;
    let ns = fresh_namespace(source);
    debug!(ns = %ns, statements = script.body.len(), "instrumenting source");

    let mut transformer = Transformer {
        source,
        cm,
        file_start: fm.start_pos,
        ns: ns.clone(),
        cache_slots: 0,
        scopes: Vec::new(),
    };
    let code = transformer.emit_script(&script);
    Ok(TransformOutput { code, ns })
}

fn parse_script(cm: &Lrc<SourceMap>, source: &str) -> Result<(Lrc<SourceFile>, js::Script)> {
    let fm = cm.new_source_file(FileName::Anon.into(), source.to_string());
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        js::EsVersion::Es2022,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let script = match parser.parse_script() {
        Ok(script) => script,
        Err(error) => return Err(lift_parse_error(cm, &error)),
    };
    // The parser recovers from some syntax errors; any recovery still
    // means the input is not a valid program.
    if let Some(error) = parser.take_errors().into_iter().next() {
        return Err(lift_parse_error(cm, &error));
    }
    Ok((fm, script))
}

fn lift_parse_error(cm: &SourceMap, error: &swc_core::ecma::parser::error::Error) -> TraceError {
    let message = error.kind().msg().to_string();
    let loc = span_location(cm, error.span());
    debug!(message = %message, "source failed to parse");
    TraceError::parse(message, loc)
}

/// Convert a byte span into a line/column location. Returns `None` for
/// the dummy span, which carries no position.
pub(crate) fn span_location(cm: &SourceMap, span: Span) -> Option<SourceLocation> {
    if span.lo == BytePos(0) && span.hi == BytePos(0) {
        return None;
    }
    let start = cm.lookup_char_pos(span.lo);
    let end = cm.lookup_char_pos(span.hi);
    Some(SourceLocation::new(
        LinePos::new(start.line, start.col_display),
        LinePos::new(end.line, end.col_display),
    ))
}

/// Pick a namespace identifier that does not occur anywhere in the
/// source text.
fn fresh_namespace(source: &str) -> String {
    let mut counter = 0usize;
    loop {
        let candidate = format!("__klve{counter}");
        if !source.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Per-invocation emission state.
pub(crate) struct Transformer<'a> {
    source: &'a str,
    cm: Lrc<SourceMap>,
    file_start: BytePos,
    ns: String,
    cache_slots: usize,
    scopes: Vec<Scope>,
}

impl<'a> Transformer<'a> {
    /// The original text of a node, by byte span.
    pub(crate) fn slice(&self, span: Span) -> &'a str {
        let lo = span.lo.0.saturating_sub(self.file_start.0) as usize;
        let hi = span.hi.0.saturating_sub(self.file_start.0) as usize;
        self.source.get(lo..hi).unwrap_or_default()
    }

    pub(crate) fn ns(&self) -> &str {
        &self.ns
    }

    /// Reserve the next temporary slot in the namespace cache holder.
    pub(crate) fn next_cache_slot(&mut self) -> usize {
        let slot = self.cache_slots;
        self.cache_slots += 1;
        slot
    }

    /// Run `f` with one more scope frame on the chain.
    pub(crate) fn with_scope<R>(&mut self, scope: Scope, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    pub(crate) fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub(crate) fn source_map(&self) -> &SourceMap {
        &self.cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The instrumented output must itself be a valid script.
    fn assert_reparses(code: &str) {
        let cm: Lrc<SourceMap> = Default::default();
        parse_script(&cm, code).unwrap_or_else(|error| {
            panic!("instrumented source failed to parse: {error}\n---\n{code}")
        });
    }

    fn instrumented(source: &str) -> TransformOutput {
        let output = instrument(source).expect("source should instrument");
        assert_reparses(&output.code);
        output
    }

    #[test]
    fn reports_surround_simple_statements() {
        let output = instrumented("const x = 1;");
        assert!(output.code.contains(&format!("{}.report", output.ns)));
        assert!(output.code.contains("VariableDeclaration"));
        assert!(output.code.contains("const x ="));
    }

    #[test]
    fn namespace_avoids_source_collisions() {
        let output = instrumented("const __klve0 = 1;");
        assert_ne!(output.ns, "__klve0");
        assert!(!"const __klve0 = 1;".contains(&output.ns));
    }

    #[test]
    fn while_loops_desugar_to_guarded_infinite_loops() {
        let output = instrumented("let i = 0; while (i < 3) { i = i + 1; }");
        assert!(output.code.contains("while (true)"));
        assert!(output.code.contains("break;"));
        assert!(output.code.contains(&format!("{}.cache[", output.ns)));
    }

    #[test]
    fn for_loops_hoist_init_into_wrapper_block() {
        let output = instrumented("for (let i = 0; i < 3; i++) {}");
        assert!(output.code.contains("while (true)"));
        // all three slots survive the rewrite
        assert!(output.code.contains("ForStatement"));
        assert!(output.code.contains("hasInit"));
    }

    #[test]
    fn empty_for_slots_become_noops() {
        let output = instrumented("for (;;) { break; }");
        assert!(output.code.contains("null;"));
    }

    #[test]
    fn return_routes_through_namespace_holder() {
        let output = instrumented("function f() { return 1; }");
        assert!(output.code.contains(&format!("{}.return =", output.ns)));
        assert!(output.code.contains(&format!("return {}.return;", output.ns)));
    }

    #[test]
    fn arrows_become_bound_functions() {
        let output = instrumented("const f = (a) => a;");
        assert!(output.code.contains(".bind(this)"));
        assert!(output.code.contains("ArrowFunctionExpression"));
    }

    #[test]
    fn method_calls_cache_their_receiver() {
        let output = instrumented("console.log('a');");
        assert!(output.code.contains(&format!("{}.cache[0]", output.ns)));
        assert!(output.code.contains(".call("));
    }

    #[test]
    fn function_declarations_carry_no_reports() {
        let output = instrumented("function f() {}");
        // the declaration is hoisted, so only its body is instrumented
        assert!(!output.code.contains("FunctionDeclaration"));
        assert!(output.code.starts_with("function f()"));
    }

    #[test]
    fn assignment_targets_are_not_read() {
        let output = instrumented("let x = 0; x = 2;");
        // `x` appears as an assignment target but never as a reported read
        assert!(!output.code.contains(r#"\"action\":\"read\""#));
    }

    #[test]
    fn computed_lhs_property_stays_reported() {
        let output = instrumented("const o = {}; let k = 'a'; o[k] = 1;");
        // the key read inside the member target is still instrumented
        assert!(output.code.contains(r#"\"action\":\"read\",\"name\":\"k\""#));
    }

    #[test]
    fn typeof_operand_is_left_verbatim() {
        let output = instrumented("typeof missing;");
        assert!(output.code.contains("typeof missing"));
        assert!(!output.code.contains(r#"\"name\":\"missing\""#));
    }

    #[test]
    fn directives_are_left_verbatim() {
        let output = instrumented("'use strict'; let x = 1;");
        assert!(output.code.starts_with("'use strict';"));
    }

    #[test]
    fn parse_failures_carry_a_location() {
        let error = instrument("const = 1;").unwrap_err();
        match error {
            TraceError::Parse { loc, .. } => assert_eq!(loc.start.line, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn instrumented_programs_reparse_across_constructs() {
        let sources = [
            "let a = [1, 2, 3]; a.push(4);",
            "const o = { n: 1, m() { return 2; } }; o.m();",
            "let s = 0; for (let i = 0; i < 4; i++) { s += i; } s;",
            "function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } fib(6);",
            "try { null.x; } catch (e) { e; } finally { 1; }",
            "let x = 1; x++; ++x; x--; --x;",
            "const f = (a, b) => a + b; f(1, 2);",
            "let t = `a${1 + 2}b`;",
            "do { 1; } while (false);",
            "for (const v of [1, 2]) { v; }",
            "label: { 1; }",
            "switch (1) { case 1: break; }",
            "a?.b?.(); var a;",
            "new Date();",
            "(function named() { return 1; })();",
        ];
        for source in sources {
            instrumented(source);
        }
    }
}
