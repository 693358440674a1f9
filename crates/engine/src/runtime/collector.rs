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

//! Per-invocation trace state shared by the reporter natives.

use std::time::Instant;

use klve_common::{DescribedValue, LimitKind, RecordLimits, ScopeFrame, Step, TraceError};

use crate::payload::StaticMeta;

/// Owns the step list, the console log queue, the described-value
/// handle table, and the limit configuration for one execution.
pub(crate) struct TraceCollector {
    steps: Vec<Step>,
    pending_logs: Vec<Vec<DescribedValue>>,
    described: Vec<DescribedValue>,
    started: Instant,
    limits: RecordLimits,
    limit_hit: Option<TraceError>,
}

impl TraceCollector {
    /// A fresh collector, seeded with the init marker.
    pub fn new(limits: RecordLimits) -> Self {
        Self {
            steps: vec![Step::init()],
            pending_logs: Vec::new(),
            described: Vec::new(),
            started: Instant::now(),
            limits,
            limit_hit: None,
        }
    }

    /// Milliseconds since the trace started.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Check the configured ceilings. A tripped ceiling latches: every
    /// later call keeps reporting it, so user code cannot catch the
    /// abort and trace on.
    pub fn check_limits(&mut self) -> Option<TraceError> {
        if let Some(error) = &self.limit_hit {
            return Some(error.clone());
        }
        let dt = self.elapsed_ms();
        if let Some(max_time) = self.limits.time {
            if dt > max_time as f64 {
                return Some(self.trip(LimitKind::Time, dt));
            }
        }
        if let Some(max_steps) = self.limits.steps {
            if self.steps.len() as u64 >= max_steps {
                return Some(self.trip(LimitKind::Steps, self.steps.len() as f64));
            }
        }
        None
    }

    fn trip(&mut self, kind: LimitKind, observed: f64) -> TraceError {
        let error = TraceError::LimitExceeded { kind, observed };
        self.limit_hit = Some(error.clone());
        error
    }

    /// Append one step, draining the pending console output into it.
    pub fn record(&mut self, meta: StaticMeta, value: DescribedValue, scopes: Vec<ScopeFrame>) {
        let step = Step {
            step: self.steps.len(),
            category: meta.category,
            node_type: Some(meta.node_type),
            time: Some(meta.time),
            dt: Some(self.elapsed_ms()),
            loc: Some(meta.loc),
            scopes: Some(scopes),
            value: Some(value),
            logs: Some(std::mem::take(&mut self.pending_logs)),
            detail: Some(meta.detail),
        };
        self.steps.push(step);
    }

    /// Queue one console write until the next step drains it.
    pub fn push_log(&mut self, entry: Vec<DescribedValue>) {
        self.pending_logs.push(entry);
    }

    /// Store a described value and return its handle.
    pub fn register_described(&mut self, value: DescribedValue) -> usize {
        self.described.push(value);
        self.described.len() - 1
    }

    /// Look a handle back up; scope snapshots resolve through here.
    pub fn resolve_described(&self, handle: usize) -> Option<DescribedValue> {
        self.described.get(handle).cloned()
    }

    /// The latched limit failure, if any ceiling tripped.
    pub fn limit_error(&self) -> Option<TraceError> {
        self.limit_hit.clone()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}
