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

//! Execution of instrumented programs.
//!
//! Each invocation gets a fresh engine context acting as its frame; no
//! state survives the call. The program runs synchronously on the
//! calling thread, and pending promise jobs are deliberately not driven
//! afterwards, so only synchronously completed work is traced.

mod collector;
mod frame;

use std::{cell::RefCell, rc::Rc};

use boa_engine::{Context, Source};
use klve_common::{RecordLimits, Result, Step, TraceError};
use tracing::debug;

use collector::TraceCollector;

/// Run an instrumented program and return the raw step list, init
/// marker first. Steps carry provisional ordinals; the filter assigns
/// the final numbering.
pub(crate) fn execute(code: &str, ns: &str, limits: RecordLimits) -> Result<Vec<Step>> {
    let mut context = Context::default();
    let collector = Rc::new(RefCell::new(TraceCollector::new(limits)));
    frame::build_frame(&mut context, ns, Rc::clone(&collector))
        .map_err(|error| TraceError::runtime(format!("frame setup failed: {error}"), None))?;

    debug!(bytes = code.len(), "executing instrumented source");
    let outcome = context.eval(Source::from_bytes(code.as_bytes()));

    // A tripped ceiling wins over whatever the program did afterwards,
    // even if user code caught the abort error.
    if let Some(error) = collector.borrow().limit_error() {
        debug!("execution aborted by limit: {error}");
        return Err(error);
    }
    if let Err(error) = outcome {
        debug!("instrumented program threw: {error}");
        return Err(TraceError::runtime(error.to_string(), None));
    }

    let steps = collector.borrow().steps().to_vec();
    debug!(steps = steps.len(), "collected raw steps");
    Ok(steps)
}
