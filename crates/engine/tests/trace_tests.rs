//! End-to-end traces: instrument, execute, filter, and check the
//! resulting step sequences.

use klve_engine::{
    record, Detail, LimitKind, Phase, RecordConfig, Step, StepCategory, TraceError,
    ValueDescriptor,
};

fn config() -> RecordConfig {
    RecordConfig::default()
}

async fn trace(source: &str) -> Vec<Step> {
    klve_common::logging::ensure_test_logging(None);
    record(source, &config()).await.expect("trace should record")
}

async fn trace_err(source: &str, config: &RecordConfig) -> TraceError {
    klve_common::logging::ensure_test_logging(None);
    record(source, config).await.expect_err("trace should fail")
}

fn find<'a>(steps: &'a [Step], node_type: &str) -> Option<&'a Step> {
    steps.iter().find(|step| step.node_type.as_deref() == Some(node_type))
}

#[tokio::test]
async fn declaration_scenario() {
    let steps = trace("const x = 1;").await;
    assert!(steps.len() > 1);
    assert_eq!(steps[0].step, 1);
    assert_eq!(steps[0].category, StepCategory::Init);

    let declaration = find(&steps, "VariableDeclaration").expect("a declaration step");
    match &declaration.detail {
        Some(Detail::Declare { kind, target }) => {
            assert_eq!(kind, "const");
            assert_eq!(target.as_deref(), Some("x"));
        }
        other => panic!("unexpected detail: {other:?}"),
    }
}

#[tokio::test]
async fn binary_expression_scenario() {
    let steps = trace("1 + 2;").await;
    let binary = find(&steps, "BinaryExpression").expect("a binary step");
    assert_eq!(binary.time, Some(Phase::After));
    match &binary.detail {
        Some(Detail::Compute { operator: Some(operator), .. }) => assert_eq!(operator, "+"),
        other => panic!("unexpected detail: {other:?}"),
    }
    assert_eq!(binary.value.as_ref().unwrap().descriptor, ValueDescriptor::number(3.0));
}

#[tokio::test]
async fn postfix_update_scenario() {
    let steps = trace("let x = 0; x++;").await;
    let update = find(&steps, "UpdateExpression").expect("an update step");
    match &update.detail {
        Some(Detail::Update { operator, prefix, target }) => {
            assert_eq!(operator, "++");
            assert!(!prefix);
            assert_eq!(target.as_deref(), Some("x"));
        }
        other => panic!("unexpected detail: {other:?}"),
    }
    // postfix reports the pre-increment value
    assert_eq!(update.value.as_ref().unwrap().descriptor, ValueDescriptor::number(0.0));
}

#[tokio::test]
async fn step_limit_scenario() {
    let mut config = config();
    config.meta.max.steps = Some(5);
    let error = trace_err("for (let i = 0; i < 100; i++) {}", &config).await;
    match error {
        TraceError::LimitExceeded { kind, observed } => {
            assert_eq!(kind, LimitKind::Steps);
            assert!(observed >= 5.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn console_scenario() {
    let steps = trace("console.log('a', 'b');").await;
    let entry = steps
        .iter()
        .filter_map(|step| step.logs.as_ref())
        .flatten()
        .next()
        .expect("one console entry");
    assert_eq!(entry.len(), 2);
    assert_eq!(entry[0].descriptor, ValueDescriptor::string("a"));
    assert_eq!(entry[1].descriptor, ValueDescriptor::string("b"));
}

#[tokio::test]
async fn parse_error_scenario() {
    let error = trace_err("const = 1;", &config()).await;
    match error {
        TraceError::Parse { loc, .. } => {
            assert!(loc.start.line >= 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn numbering_is_consecutive_from_one() {
    let steps = trace("let a = 1; let b = a + 2; console.log(b);").await;
    let numbers: Vec<usize> = steps.iter().map(|step| step.step).collect();
    assert_eq!(numbers, (1..=steps.len()).collect::<Vec<_>>());
    assert_eq!(steps.iter().filter(|step| step.is_init()).count(), 1);
    assert!(steps[0].is_init());
}

#[tokio::test]
async fn every_step_is_well_formed() {
    let source = r#"
        let total = 0;
        function add(n) { total += n; return total; }
        for (let i = 0; i < 3; i++) { add(i); }
        if (total > 1) { console.log(total); } else { console.log('small'); }
        const square = (n) => n * n;
        square(total);
        try { null.x; } catch (e) { total = -1; }
        while (total < 0) { total++; }
    "#;
    let steps = trace(source).await;

    let mut last_dt = 0.0_f64;
    for step in &steps {
        if step.is_init() {
            assert!(step.node_type.is_none() && step.time.is_none());
            continue;
        }
        assert!(step.node_type.is_some(), "non-init step without a type: {step:?}");
        assert!(step.time.is_some(), "non-init step without a phase: {step:?}");
        let dt = step.dt.expect("non-init step without dt");
        assert!(dt >= 0.0 && dt >= last_dt, "dt must be monotonic");
        last_dt = dt;
        assert!(step.loc.is_some());
        assert!(step.detail.is_some());
    }
}

#[tokio::test]
async fn before_steps_precede_their_afters() {
    let steps = trace("if (1 < 2) { 1; } while (false) { 2; }").await;
    for node_type in ["IfStatement", "WhileStatement"] {
        let phases: Vec<Phase> = steps
            .iter()
            .filter(|step| step.node_type.as_deref() == Some(node_type))
            .filter_map(|step| step.time)
            .collect();
        assert_eq!(phases.first(), Some(&Phase::Before), "{node_type}");
        assert_eq!(phases.last(), Some(&Phase::After), "{node_type}");
    }
}

#[tokio::test]
async fn heap_references_stay_in_bounds() {
    let steps = trace("const a = { n: [1, 2] }; a.n.push(a); a;").await;
    for step in &steps {
        let described = step.value.iter().chain(
            step.scopes.iter().flatten().flat_map(|frame| frame.values()),
        );
        for value in described {
            let mut references = Vec::new();
            if let ValueDescriptor::Compound { at } = value.descriptor {
                references.push(at);
            }
            for object in &value.heap {
                for (_, entry) in &object.entries {
                    if let ValueDescriptor::Compound { at } = entry {
                        references.push(*at);
                    }
                }
            }
            for at in references {
                assert!(at < value.heap.len(), "dangling heap index {at}");
            }
        }
    }
}

#[tokio::test]
async fn generous_step_limit_does_not_fire() {
    let mut config = config();
    config.meta.max.steps = Some(1000);
    let steps = record("let x = 1; x + 1;", &config).await.expect("under the ceiling");
    assert!(steps.len() <= 1000);
}

#[tokio::test]
async fn time_limit_aborts_slow_programs() {
    let mut config = config();
    config.meta.max.time = Some(0);
    // any report after the first instant trips a zero-millisecond budget
    let error = trace_err("let i = 0; while (i < 100000) { i = i + 1; }", &config).await;
    match error {
        TraceError::LimitExceeded { kind, observed } => {
            assert_eq!(kind, LimitKind::Time);
            assert!(observed >= 0.0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn traced_programs_keep_their_semantics() {
    // fibonacci through recursion, loops, and conditionals
    let source = r#"
        function fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        let out = [];
        for (let i = 0; i < 7; i++) { out.push(fib(i)); }
        console.log(out);
    "#;
    let steps = trace(source).await;
    let logged = steps
        .iter()
        .filter_map(|step| step.logs.as_ref())
        .flatten()
        .next()
        .expect("the logged array");
    let ValueDescriptor::Compound { at } = logged[0].descriptor else {
        panic!("expected an array value");
    };
    let array = &logged[0].heap[at];
    let values: Vec<ValueDescriptor> =
        array.entries.iter().map(|(_, descriptor)| descriptor.clone()).collect();
    let expected: Vec<ValueDescriptor> =
        [0.0, 1.0, 1.0, 2.0, 3.0, 5.0, 8.0].iter().map(|n| ValueDescriptor::number(*n)).collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn method_call_on_literal_receiver_sees_it_once() {
    // the receiver expression has a side effect; it must run exactly once
    let source = r#"
        let builds = 0;
        function make() { builds = builds + 1; return { go() { return 9; } }; }
        make().go();
        builds;
    "#;
    let steps = trace(source).await;
    let last_read = steps
        .iter()
        .rev()
        .find(|step| step.node_type.as_deref() == Some("Identifier"))
        .expect("the final read of builds");
    assert_eq!(last_read.value.as_ref().unwrap().descriptor, ValueDescriptor::number(1.0));
}

#[tokio::test]
async fn init_serializes_bare_and_steps_round_trip() {
    let steps = trace("1;").await;
    let json = serde_json::to_value(&steps).unwrap();
    assert_eq!(json[0], serde_json::json!({"step": 1, "category": "init"}));
    let back: Vec<Step> = serde_json::from_value(json).unwrap();
    assert_eq!(back.len(), steps.len());
}
