// Copyright (C) 2025 The KLVE authors
// SPDX-License-Identifier: AGPL-3.0
//! KLVE Engine - Deterministic execution traces of JavaScript snippets
//!
//! The pipeline: instrument the source so a reporter runs around every
//! expression and statement, execute the instrumented program in an
//! embedded engine, then filter and renumber the collected steps.
//!
//! ```no_run
//! use klve_engine::{record, RecordConfig};
//!
//! # async fn demo() -> klve_engine::Result<()> {
//! let steps = record("const x = 1;", &RecordConfig::default()).await?;
//! assert!(steps[0].is_init());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod describe;
mod filter;
mod payload;
mod runtime;
mod transform;

use tracing::{debug, info};

pub use klve_common::{
    options_schema, verify_options, DescribedValue, Detail, HeapKind, HeapObject, LimitKind,
    LinePos, Phase, RecordConfig, RecordLimits, RecordMeta, Result, Revived, RevivedObject,
    ScopeFrame, SourceLocation, Step, StepCategory, TraceError, TraceOptions, ValueDescriptor,
};
pub use klve_common::value::undescribe;

/// Static tracer identity, as exposed to hosts.
pub const TRACER_ID: &str = "js:klve";

/// File extensions this tracer accepts.
pub const LANGS: [&str; 3] = ["js", "mjs", "cjs"];

/// Record a step-by-step execution trace of a JavaScript snippet.
///
/// The source is instrumented, executed in a fresh frame, and the
/// collected steps are filtered and renumbered according to the
/// options. Nothing survives the invocation: the frame, the step list,
/// and every temporary live and die with this call.
///
/// The options are expected to be validated (see
/// [`verify_options`]); limits come from `config.meta.max`, where
/// `None` disables a ceiling.
pub async fn record(source: &str, config: &RecordConfig) -> Result<Vec<Step>> {
    info!(bytes = source.len(), "recording trace");

    let output = transform::instrument(source)?;
    debug!(instrumented_bytes = output.code.len(), "source instrumented");

    let raw = runtime::execute(&output.code, &output.ns, config.meta.max)?;
    let steps = filter::apply(raw, &config.options);

    info!(steps = steps.len(), "trace recorded");
    Ok(steps)
}
