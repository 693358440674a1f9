//! Filtering behavior observed through the public entrypoint, plus the
//! static identity surface.

use klve_engine::{
    options_schema, record, verify_options, Phase, RecordConfig, Step, TraceError, TraceOptions,
    LANGS, TRACER_ID,
};

const SOURCE: &str = "let x = 1; let y = x + 2; if (y > 2) { console.log(y); }";

async fn trace_with(options: TraceOptions) -> Vec<Step> {
    klve_common::logging::ensure_test_logging(None);
    let config = RecordConfig { options, ..RecordConfig::default() };
    record(SOURCE, &config).await.expect("trace should record")
}

#[tokio::test]
async fn identity_is_static() {
    assert_eq!(TRACER_ID, "js:klve");
    assert_eq!(LANGS, ["js", "mjs", "cjs"]);
    let schema = options_schema();
    assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema#");
}

#[tokio::test]
async fn default_options_keep_everything() {
    let steps = trace_with(TraceOptions::default()).await;
    assert!(steps.iter().any(|step| step.node_type.as_deref() == Some("NumericLiteral")));
    assert!(steps.iter().any(|step| step.time == Some(Phase::Before)));
    assert!(steps.iter().any(|step| step.time == Some(Phase::After)));
}

#[tokio::test]
async fn timing_filter_drops_a_phase() {
    let mut options = TraceOptions::default();
    options.filter.timing.before = false;
    let steps = trace_with(options).await;
    assert!(steps.iter().all(|step| step.time != Some(Phase::Before)));
    assert!(steps[0].is_init());
}

#[tokio::test]
async fn node_toggles_drop_their_type() {
    let mut options = TraceOptions::default();
    options.literals.numeric = false;
    options.branches.if_statement = false;
    let steps = trace_with(options).await;
    assert!(steps.iter().all(|step| step.node_type.as_deref() != Some("NumericLiteral")));
    assert!(steps.iter().all(|step| step.node_type.as_deref() != Some("IfStatement")));
    // other types survive
    assert!(steps.iter().any(|step| step.node_type.as_deref() == Some("VariableDeclaration")));
}

#[tokio::test]
async fn name_include_restricts_to_mentioned_names() {
    let mut options = TraceOptions::default();
    options.filter.names.include = vec!["x".to_string()];
    let steps = trace_with(options).await;
    for step in &steps {
        if let Some(detail) = &step.detail {
            let candidates = detail.name_candidates();
            if !candidates.is_empty() {
                assert!(candidates.contains(&"x"), "unexpected named step: {step:?}");
            }
        }
    }
}

#[tokio::test]
async fn name_exclude_drops_mentioned_names() {
    let mut options = TraceOptions::default();
    options.filter.names.exclude = vec!["y".to_string()];
    let steps = trace_with(options).await;
    for step in &steps {
        if let Some(detail) = &step.detail {
            assert!(!detail.name_candidates().contains(&"y"), "excluded step kept: {step:?}");
        }
    }
}

#[tokio::test]
async fn include_exclude_duality_over_the_name_universe() {
    // the only names this program mentions
    let universe = ["x", "y", "log", "console"];
    let mut include = TraceOptions::default();
    include.filter.names.include = vec!["x".to_string()];
    let mut exclude = TraceOptions::default();
    exclude.filter.names.exclude =
        universe.iter().filter(|name| **name != "x").map(|name| name.to_string()).collect();

    let left: Vec<(Option<String>, Option<Phase>)> = trace_with(include)
        .await
        .iter()
        .map(|step| (step.node_type.clone(), step.time))
        .collect();
    let right: Vec<(Option<String>, Option<Phase>)> = trace_with(exclude)
        .await
        .iter()
        .map(|step| (step.node_type.clone(), step.time))
        .collect();
    assert_eq!(left, right);
}

#[tokio::test]
async fn restrictions_never_grow_the_trace() {
    let baseline = trace_with(TraceOptions::default()).await.len();

    let mut timing = TraceOptions::default();
    timing.filter.timing.before = false;
    let timing_len = trace_with(timing).await.len();

    let mut nodes = TraceOptions::default();
    nodes.filter.timing.before = false;
    nodes.reads.identifier = false;
    let nodes_len = trace_with(nodes).await.len();

    let mut names = TraceOptions::default();
    names.filter.timing.before = false;
    names.reads.identifier = false;
    names.filter.names.exclude = vec!["y".to_string()];
    let names_len = trace_with(names).await.len();

    assert!(baseline >= timing_len);
    assert!(timing_len >= nodes_len);
    assert!(nodes_len >= names_len);
}

#[tokio::test]
async fn data_stripping_removes_fields_not_steps() {
    let mut options = TraceOptions::default();
    options.filter.data.scopes = false;
    options.filter.data.value = false;
    options.filter.data.logs = false;
    options.filter.data.dt = false;
    options.filter.data.loc = false;
    let steps = trace_with(options).await;
    let full = trace_with(TraceOptions::default()).await;
    assert_eq!(steps.len(), full.len());
    for step in steps.iter().filter(|step| !step.is_init()) {
        assert!(step.scopes.is_none());
        assert!(step.value.is_none());
        assert!(step.logs.is_none());
        assert!(step.dt.is_none());
        assert!(step.loc.is_none());
        // identity fields survive stripping
        assert!(step.node_type.is_some());
        assert!(step.detail.is_some());
    }
}

#[tokio::test]
async fn renumbering_is_dense_after_any_filter() {
    let mut options = TraceOptions::default();
    options.filter.timing.before = false;
    options.literals.numeric = false;
    let steps = trace_with(options).await;
    let numbers: Vec<usize> = steps.iter().map(|step| step.step).collect();
    assert_eq!(numbers, (1..=steps.len()).collect::<Vec<_>>());
}

#[test]
fn options_with_both_name_lists_are_rejected() {
    let mut options = TraceOptions::default();
    options.filter.names.include = vec!["x".to_string()];
    options.filter.names.exclude = vec!["y".to_string()];
    assert!(matches!(verify_options(&options), Err(TraceError::InvalidOptions { .. })));
}

#[test]
fn options_deserialize_with_defaults() {
    let config: RecordConfig = serde_json::from_str(
        r#"{
            "meta": { "max": { "steps": 50, "time": null }, "trace": "7f3c" },
            "options": { "filter": { "timing": { "before": false } } }
        }"#,
    )
    .unwrap();
    assert_eq!(config.meta.max.steps, Some(50));
    assert_eq!(config.meta.max.time, None);
    assert!(!config.options.filter.timing.before);
    assert!(config.options.filter.timing.after);
    assert!(config.options.literals.numeric);
}
