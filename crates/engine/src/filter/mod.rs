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

//! Step filtering and renumbering.
//!
//! A pure pipeline over the raw step list: the timing filter, the
//! node-type table, the name filter, per-field data stripping, and a
//! final renumbering from 1. The init marker is exempt from every
//! dropping axis. The axes are independent, so their order does not
//! change the surviving set.

mod table;

use klve_common::{DataOptions, NameFilterMode, Phase, Step, TraceOptions};
use tracing::debug;

/// Apply the options to a raw step list and renumber the survivors.
pub(crate) fn apply(steps: Vec<Step>, options: &TraceOptions) -> Vec<Step> {
    let mode = options.filter.names.mode();
    let raw_count = steps.len();
    let mut kept: Vec<Step> =
        steps.into_iter().filter(|step| keep(step, options, mode)).collect();
    for step in &mut kept {
        strip(step, &options.filter.data);
    }
    for (index, step) in kept.iter_mut().enumerate() {
        step.step = index + 1;
    }
    debug!(raw = raw_count, kept = kept.len(), "filtered steps");
    kept
}

fn keep(step: &Step, options: &TraceOptions, mode: NameFilterMode) -> bool {
    if step.is_init() {
        return true;
    }
    match step.time {
        Some(Phase::Before) if !options.filter.timing.before => return false,
        Some(Phase::After) if !options.filter.timing.after => return false,
        _ => {}
    }
    if let Some(node_type) = &step.node_type {
        if !table::node_enabled(options, node_type) {
            return false;
        }
    }
    keep_by_name(step, options, mode)
}

fn keep_by_name(step: &Step, options: &TraceOptions, mode: NameFilterMode) -> bool {
    let candidates: Vec<&str> =
        step.detail.as_ref().map(|detail| detail.name_candidates()).unwrap_or_default();
    match mode {
        NameFilterMode::None => true,
        // steps that mention no name at all are never name-filtered
        _ if candidates.is_empty() => true,
        NameFilterMode::Include => candidates
            .iter()
            .any(|candidate| options.filter.names.include.iter().any(|name| name == candidate)),
        NameFilterMode::Exclude => !candidates
            .iter()
            .any(|candidate| options.filter.names.exclude.iter().any(|name| name == candidate)),
    }
}

fn strip(step: &mut Step, data: &DataOptions) {
    if !data.scopes {
        step.scopes = None;
    }
    if !data.value {
        step.value = None;
    }
    if !data.logs {
        step.logs = None;
    }
    if !data.dt {
        step.dt = None;
    }
    if !data.loc {
        step.loc = None;
    }
}

#[cfg(test)]
mod tests {
    use klve_common::{Detail, StepCategory};
    use pretty_assertions::assert_eq;

    use super::*;

    fn step(node_type: &str, time: Phase, detail: Detail) -> Step {
        let mut step = Step::init();
        step.category = StepCategory::Expression;
        step.node_type = Some(node_type.to_string());
        step.time = Some(time);
        step.dt = Some(1.0);
        step.detail = Some(detail);
        step.scopes = Some(Vec::new());
        step.logs = Some(Vec::new());
        step
    }

    fn sample() -> Vec<Step> {
        vec![
            Step::init(),
            step("Identifier", Phase::After, Detail::Read { name: "x".to_string() }),
            step("Identifier", Phase::After, Detail::Read { name: "y".to_string() }),
            step(
                "BinaryExpression",
                Phase::After,
                Detail::Compute { operator: Some("+".to_string()), prefix: None },
            ),
            step("IfStatement", Phase::Before, Detail::Branch { has_alternate: false }),
            step("IfStatement", Phase::After, Detail::Branch { has_alternate: false }),
        ]
    }

    #[test]
    fn renumbering_starts_at_one_and_is_consecutive() {
        let kept = apply(sample(), &TraceOptions::default());
        let numbers: Vec<usize> = kept.iter().map(|step| step.step).collect();
        assert_eq!(numbers, (1..=numbers.len()).collect::<Vec<_>>());
        assert!(kept[0].is_init());
        assert_eq!(kept[0].step, 1);
    }

    #[test]
    fn timing_filter_drops_only_the_disabled_phase() {
        let mut options = TraceOptions::default();
        options.filter.timing.before = false;
        let kept = apply(sample(), &options);
        assert!(kept.iter().all(|step| step.time != Some(Phase::Before)));
        // init survives
        assert!(kept[0].is_init());
    }

    #[test]
    fn node_filter_drops_disabled_types() {
        let mut options = TraceOptions::default();
        options.reads.identifier = false;
        let kept = apply(sample(), &options);
        assert!(kept.iter().all(|step| step.node_type.as_deref() != Some("Identifier")));
        assert_eq!(kept.len(), sample().len() - 2);
    }

    #[test]
    fn include_keeps_only_matching_names_plus_nameless_steps() {
        let mut options = TraceOptions::default();
        options.filter.names.include = vec!["x".to_string()];
        let kept = apply(sample(), &options);
        // y is dropped; nameless steps and init stay
        assert_eq!(kept.len(), sample().len() - 1);
        assert!(!kept.iter().any(|step| matches!(
            &step.detail,
            Some(Detail::Read { name }) if name == "y"
        )));
    }

    #[test]
    fn include_and_exclude_duality() {
        let mut include = TraceOptions::default();
        include.filter.names.include = vec!["x".to_string()];
        let mut exclude = TraceOptions::default();
        exclude.filter.names.exclude = vec!["y".to_string()];
        // over a program whose only names are x and y, the two agree
        let left = apply(sample(), &include);
        let right = apply(sample(), &exclude);
        assert_eq!(left, right);
    }

    #[test]
    fn filtering_is_monotone() {
        let baseline = apply(sample(), &TraceOptions::default()).len();
        let mut restricted = TraceOptions::default();
        restricted.filter.timing.before = false;
        let once = apply(sample(), &restricted).len();
        restricted.operators.binary = false;
        let twice = apply(sample(), &restricted).len();
        restricted.filter.names.exclude = vec!["x".to_string()];
        let thrice = apply(sample(), &restricted).len();
        assert!(baseline >= once && once >= twice && twice >= thrice);
    }

    #[test]
    fn data_stripping_clears_only_disabled_fields() {
        let mut options = TraceOptions::default();
        options.filter.data.scopes = false;
        options.filter.data.dt = false;
        let kept = apply(sample(), &options);
        let step = &kept[1];
        assert!(step.scopes.is_none());
        assert!(step.dt.is_none());
        assert!(step.logs.is_some());
        assert!(step.detail.is_some());
    }

    #[test]
    fn axes_commute() {
        // applying a combined restriction once equals the same set as
        // filtering in any order, since apply is a single pass
        let mut combined = TraceOptions::default();
        combined.filter.timing.before = false;
        combined.reads.identifier = false;
        combined.filter.names.exclude = vec!["x".to_string()];
        let direct = apply(sample(), &combined);

        let mut timing_only = TraceOptions::default();
        timing_only.filter.timing.before = false;
        let mut nodes_only = TraceOptions::default();
        nodes_only.reads.identifier = false;
        let mut names_only = TraceOptions::default();
        names_only.filter.names.exclude = vec!["x".to_string()];
        let staged = apply(apply(apply(sample(), &names_only), &nodes_only), &timing_only);

        let direct_keys: Vec<_> = direct.iter().map(|s| (s.node_type.clone(), s.time)).collect();
        let staged_keys: Vec<_> = staged.iter().map(|s| (s.node_type.clone(), s.time)).collect();
        assert_eq!(direct_keys, staged_keys);
    }
}
