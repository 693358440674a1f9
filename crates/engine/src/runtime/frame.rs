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

//! Execution frame construction.
//!
//! Installs the reserved namespace object (reporter, describer, cache
//! holder, return slot) and a `console` whose `log` drains into the
//! collector. The namespace also carries the engine's own
//! `JSON.stringify`, captured before user code runs, which the emitted
//! scope snapshots use to cross the boundary as plain JSON.

use std::{cell::RefCell, rc::Rc};

use boa_engine::{
    js_string, object::ObjectInitializer, property::Attribute, Context, JsArgs, JsNativeError,
    JsResult, JsString, JsValue, NativeFunction, Source,
};
use klve_common::ScopeFrame;
use tracing::warn;

use super::collector::TraceCollector;
use crate::{describe::describe, payload::StaticMeta};

/// Message carried by the abort error a tripped ceiling raises. The
/// collector's latch is authoritative; this string is only what user
/// code sees if it catches the abort.
pub(crate) const LIMIT_MESSAGE: &str = "trace limit exceeded";

/// Install the namespace and console globals into a fresh context.
pub(crate) fn build_frame(
    context: &mut Context,
    ns: &str,
    collector: Rc<RefCell<TraceCollector>>,
) -> JsResult<()> {
    let stringify = context.eval(Source::from_bytes(b"JSON.stringify"))?;

    let cache = ObjectInitializer::new(context).build();
    let ns_object = ObjectInitializer::new(context)
        .function(report_function(Rc::clone(&collector)), js_string!("report"), 2)
        .function(describe_function(Rc::clone(&collector)), js_string!("describe"), 1)
        .property(js_string!("cache"), cache, Attribute::all())
        .property(js_string!("return"), JsValue::undefined(), Attribute::all())
        .property(js_string!("json"), stringify, Attribute::all())
        .build();
    context.register_global_property(JsString::from(ns), ns_object, Attribute::all())?;

    let console = ObjectInitializer::new(context)
        .function(log_function(collector), js_string!("log"), 0)
        .build();
    context.register_global_property(js_string!("console"), console, Attribute::all())?;
    Ok(())
}

fn report_function(collector: Rc<RefCell<TraceCollector>>) -> NativeFunction {
    // SAFETY: the closure captures only reference-counted plain Rust
    // state, never a garbage-collected value.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            if collector.borrow_mut().check_limits().is_some() {
                return Err(JsNativeError::error().with_message(LIMIT_MESSAGE).into());
            }
            let value = args.get_or_undefined(0).clone();
            let meta = decode_meta(args.get_or_undefined(1))?;
            let described = describe(&value, context);
            let scopes = decode_scopes(args.get_or_undefined(2), &collector);
            collector.borrow_mut().record(meta, described, scopes);
            Ok(value)
        })
    }
}

fn describe_function(collector: Rc<RefCell<TraceCollector>>) -> NativeFunction {
    // SAFETY: as above; only the collector is captured.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            let described = describe(args.get_or_undefined(0), context);
            let handle = collector.borrow_mut().register_described(described);
            Ok(JsValue::from(handle as i32))
        })
    }
}

fn log_function(collector: Rc<RefCell<TraceCollector>>) -> NativeFunction {
    // SAFETY: as above; only the collector is captured.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            let entry: Vec<_> = args.iter().map(|arg| describe(arg, context)).collect();
            collector.borrow_mut().push_log(entry);
            Ok(JsValue::undefined())
        })
    }
}

fn decode_meta(value: &JsValue) -> JsResult<StaticMeta> {
    let Some(text) = value.as_string() else {
        return Err(JsNativeError::typ().with_message("reporter metadata must be a string").into());
    };
    match serde_json::from_str(&text.to_std_string_escaped()) {
        Ok(meta) => Ok(meta),
        Err(error) => Err(JsNativeError::typ()
            .with_message(format!("malformed reporter metadata: {error}"))
            .into()),
    }
}

fn decode_scopes(value: &JsValue, collector: &Rc<RefCell<TraceCollector>>) -> Vec<ScopeFrame> {
    let Some(text) = value.as_string() else {
        return Vec::new();
    };
    let frames: Vec<Vec<(String, usize)>> =
        match serde_json::from_str(&text.to_std_string_escaped()) {
            Ok(frames) => frames,
            Err(error) => {
                warn!(%error, "unreadable scope snapshot");
                return Vec::new();
            }
        };
    let collector = collector.borrow();
    frames
        .into_iter()
        .map(|frame| {
            let mut scope = ScopeFrame::new();
            for (name, handle) in frame {
                if let Some(value) = collector.resolve_described(handle) {
                    scope.insert(name, value);
                }
            }
            scope
        })
        .collect()
}
