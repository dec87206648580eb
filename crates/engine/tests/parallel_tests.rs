use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::Context;
use flowparam_engine::{
    ExecutionContext, LocalRuntime, Operator, OperatorParam, ParamType, ParamValue, ParameterError, Pipeline, RuntimeError,
    SubmissionConfig, Topology, operator_factory, resolve, resolve_as,
};
use indexmap::IndexMap;
use serde_json::{Value, json};

fn sorted_integers(outputs: &[Value]) -> Vec<i64> {
    let mut values: Vec<i64> = outputs.iter().filter_map(Value::as_i64).collect();
    values.sort_unstable();
    values
}

#[test]
fn chained_regions_use_independent_widths() {
    let mut topology = Topology::new("chained");
    let w1 = topology.create_submission_parameter("w1", None, Some(ParamType::Integer)).expect("w1");
    let w2 = topology.create_submission_parameter("w2", None, Some(ParamType::Integer)).expect("w2");

    let by_handle = w1.clone();
    let pipeline = Pipeline::source(0..=66)
        .set_parallel(&w1)
        .filter(move |tuple| Ok(tuple.as_i64().context("integer tuple")? % by_handle.try_get_as::<i64>()? == 0))
        .end_parallel()
        .set_parallel(&w2)
        // Worker code that only knows the parameter by name.
        .filter(|tuple| Ok(tuple.as_i64().context("integer tuple")? % resolve_as::<i64>("w2")? == 0))
        .end_parallel();

    let config = SubmissionConfig::new().with_parameter("w1", 3).with_parameter("w2", 5);
    let report = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).expect("run");

    assert_eq!(sorted_integers(&report.outputs), vec![0, 15, 30, 45, 60]);
    let channels: Vec<u32> = report.regions.iter().map(|region| region.channels).collect();
    assert_eq!(channels, vec![3, 5]);
}

#[test]
fn handle_and_resolver_agree_in_every_worker() {
    let mut topology = Topology::new("consistency");
    let modulo = topology
        .create_submission_parameter("modulo", Some(2.into()), Some(ParamType::Integer))
        .expect("modulo");

    let handle = modulo.clone();
    let pipeline = Pipeline::source(0..12).set_parallel(4u32).map(move |_| {
        let context = ExecutionContext::current().context("worker context")?;
        let from_handle = handle.try_get()?;
        let by_name = resolve("modulo", None)?;
        Ok(json!({
            "channel": context.channel(),
            "same": from_handle == by_name,
            "value": by_name.as_i64(),
        }))
    });

    let config = SubmissionConfig::new().with_parameter("modulo", "5");
    let report = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).expect("run");

    assert_eq!(report.outputs.len(), 12);
    for output in &report.outputs {
        assert_eq!(output["same"], json!(true), "{output}");
        assert_eq!(output["value"], json!(5), "{output}");
    }
    let mut seen_channels: Vec<i64> = report.outputs.iter().filter_map(|output| output["channel"].as_i64()).collect();
    seen_channels.dedup();
    assert_eq!(seen_channels, vec![0, 1, 2, 3]);
}

#[test]
fn unknown_name_in_worker_fails_the_run() {
    let mut topology = Topology::new("typo");
    topology.create_submission_parameter("w1", Some(2.into()), None).expect("w1");

    let pipeline = Pipeline::source(0..4)
        .set_parallel(2u32)
        .filter(|tuple| Ok(tuple.as_i64().unwrap_or_default() % resolve_as::<i64>("w_one")? == 0));

    let error = LocalRuntime::new()
        .submit_and_run(&topology, &pipeline, &SubmissionConfig::new())
        .unwrap_err();

    assert!(matches!(error, RuntimeError::WorkerFailed { ref region, .. } if region == "parallel-1"), "{error}");
    assert_eq!(error.parameter_error(), Some(&ParameterError::unknown("w_one")));
}

#[test]
fn invalid_width_fails_before_operators_are_built() {
    let mut topology = Topology::new("zero-width");
    let width = topology.create_submission_parameter("width", Some(1.into()), None).expect("width");

    let instances = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&instances);
    let pipeline = Pipeline::source(0..4).set_parallel(&width).operator(
        "identity",
        IndexMap::new(),
        operator_factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Passthrough
        }),
    );

    let config = SubmissionConfig::new().with_parameter("width", 0);
    let error = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).unwrap_err();

    assert!(matches!(error.parameter_error(), Some(ParameterError::Structural { name, .. }) if name == "width"), "{error}");
    assert_eq!(instances.load(Ordering::SeqCst), 0);
}

#[test]
fn rejected_width_leaves_handles_unbound_for_resubmission() {
    let mut topology = Topology::new("resubmit");
    let width = topology.create_submission_parameter("width", None, Some(ParamType::Integer)).expect("width");
    let pipeline = Pipeline::source(0..6).set_parallel(&width).map(Ok);
    let runtime = LocalRuntime::new();

    let rejected = SubmissionConfig::new().with_parameter("width", 0);
    let error = runtime.submit_and_run(&topology, &pipeline, &rejected).unwrap_err();
    assert!(matches!(error.parameter_error(), Some(ParameterError::Structural { .. })), "{error}");
    assert!(!width.is_bound());

    let corrected = SubmissionConfig::new().with_parameter("width", "3");
    let report = runtime.submit_and_run(&topology, &pipeline, &corrected).expect("resubmission");
    assert_eq!(sorted_integers(&report.outputs), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(width.get_as::<i64>(), Some(3));
}

#[test]
fn handle_width_builds_one_operator_per_channel() {
    struct ChannelTag;

    impl Operator for ChannelTag {
        fn process(&mut self, _tuple: Value) -> anyhow::Result<Vec<Value>> {
            let context = ExecutionContext::current().context("worker context")?;
            Ok(vec![json!(context.channel())])
        }
    }

    let mut topology = Topology::new("instances");
    let w1 = topology.create_submission_parameter("w1", None, Some(ParamType::Integer)).expect("w1");

    let instances = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&instances);
    let pipeline = Pipeline::source(0..9).set_parallel(&w1).operator(
        "tag",
        IndexMap::new(),
        operator_factory(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            ChannelTag
        }),
    );

    let config = SubmissionConfig::new().with_parameter("w1", "3");
    let report = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).expect("run");

    assert_eq!(instances.load(Ordering::SeqCst), 3);
    let channels: BTreeSet<i64> = report.outputs.iter().filter_map(Value::as_i64).collect();
    assert_eq!(channels, BTreeSet::from([0, 1, 2]));
    assert_eq!(report.outputs.len(), 9);
}

#[test]
fn operator_parameters_are_bound_at_instantiation() {
    struct Publisher {
        topic: String,
        period: f64,
    }

    impl Operator for Publisher {
        fn process(&mut self, tuple: Value) -> anyhow::Result<Vec<Value>> {
            Ok(vec![json!({ "topic": self.topic, "period": self.period, "tuple": tuple })])
        }
    }

    let mut topology = Topology::new("publish");
    let topic = topology.create_submission_parameter("mytopic", None, None).expect("mytopic");

    let mut params = IndexMap::new();
    params.insert("topic".to_string(), OperatorParam::from(&topic));
    params.insert("period".to_string(), OperatorParam::from(0.02));

    let factory = operator_factory(|params| Publisher {
        topic: params["topic"].to_string(),
        period: params["period"].as_f64().unwrap_or_default(),
    });
    let pipeline = Pipeline::source([1]).operator("publish", params, factory);

    let config = SubmissionConfig::new().with_parameter("mytopic", "topology/test");
    let report = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).expect("run");

    assert_eq!(report.outputs, vec![json!({ "topic": "topology/test", "period": 0.02, "tuple": 1 })]);
    assert_eq!(topic.get(), Some(ParamValue::from("topology/test")));
}

#[test]
fn scoped_values_are_resolved_once_per_operator() {
    struct Suffix {
        scope: Option<flowparam_engine::ParameterScope>,
    }

    impl Operator for Suffix {
        fn open(&mut self) -> anyhow::Result<()> {
            self.scope = Some(flowparam_engine::resolver::scope("addin", Some(ParamType::String))?);
            Ok(())
        }

        fn process(&mut self, tuple: Value) -> anyhow::Result<Vec<Value>> {
            let scope = self.scope.as_ref().context("operator used before open")?;
            Ok(vec![json!(format!("{}{}", tuple.as_str().unwrap_or_default(), scope.get_as::<String>()?))])
        }
    }

    let mut topology = Topology::new("append");
    topology.create_submission_parameter("addin", None, None).expect("addin");

    let pipeline = Pipeline::source(["a", "b"]).operator("suffix", IndexMap::new(), operator_factory(|_| Suffix { scope: None }));
    let config = SubmissionConfig::new().with_parameter("addin", "Yeah!");
    let report = LocalRuntime::new().submit_and_run(&topology, &pipeline, &config).expect("run");

    assert_eq!(report.outputs, vec![json!("aYeah!"), json!("bYeah!")]);
}

struct Passthrough;

impl Operator for Passthrough {
    fn process(&mut self, tuple: Value) -> anyhow::Result<Vec<Value>> {
        Ok(vec![tuple])
    }
}
