//! Thread-per-channel execution of a [`Pipeline`] for one submission.
//!
//! Every structural value is resolved before the first worker starts. Each worker then
//! decodes the job's startup payload into its own [`ExecutionContext`], installs it on
//! its thread, and runs fresh operator instances over its partition of the tuples.

use std::{io, num::NonZeroU32, thread};

use anyhow::Context;
use flowparam_types::{BindingSet, ParamValue, SubmissionConfig};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    operator::{Operator, OperatorFactory},
    pipeline::Pipeline,
};
use crate::{
    context::ExecutionContext,
    error::ParameterError,
    structural::StructuralBinder,
    topology::{Submission, Topology},
};

/// Failures while running a submitted job locally.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("failed to encode startup payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("worker {channel} of region '{region}' failed: {source:#}")]
    WorkerFailed {
        region: String,
        channel: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("worker {channel} of region '{region}' panicked")]
    WorkerPanicked { region: String, channel: u32 },
}

impl RuntimeError {
    /// The parameter error behind this failure, whether raised at submission or inside a worker.
    pub fn parameter_error(&self) -> Option<&ParameterError> {
        match self {
            RuntimeError::Parameter(error) => Some(error),
            RuntimeError::WorkerFailed { source, .. } => source.downcast_ref::<ParameterError>(),
            _ => None,
        }
    }
}

/// Outcome of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub label: String,
    pub channels: u32,
    pub tuples_in: usize,
    pub tuples_out: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub job_name: Option<String>,
    /// Final tuples, grouped by the channel of the last region that produced them.
    pub outputs: Vec<Value>,
    pub regions: Vec<RegionReport>,
}

impl RunReport {
    pub fn region(&self, label: &str) -> Option<&RegionReport> {
        self.regions.iter().find(|region| region.label == label)
    }
}

struct PlannedRegion {
    label: String,
    channels: NonZeroU32,
    stages: Vec<PlannedStage>,
}

struct PlannedStage {
    name: String,
    params: IndexMap<String, ParamValue>,
    factory: OperatorFactory,
}

/// Runs pipelines in-process, one named thread per parallel channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRuntime;

impl LocalRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Submits `config` to `topology` and runs `pipeline` when the submission is accepted.
    ///
    /// Structural values are checked against the bindings before they are committed, so
    /// a rejected submission returns [`RuntimeError::Parameter`] with every handle left
    /// unbound and before any worker or operator instance is created.
    pub fn submit_and_run(
        &self,
        topology: &Topology,
        pipeline: &Pipeline,
        config: &SubmissionConfig,
    ) -> Result<RunReport, RuntimeError> {
        let bindings = topology.preflight(config)?;
        let planned = plan(pipeline, &bindings)?;
        let submission = topology.commit(bindings)?;
        self.execute(pipeline, &submission, planned)
    }

    /// Runs `pipeline` for an accepted submission.
    pub fn run(&self, pipeline: &Pipeline, submission: &Submission) -> Result<RunReport, RuntimeError> {
        let planned = plan(pipeline, submission.bindings())?;
        self.execute(pipeline, submission, planned)
    }

    fn execute(&self, pipeline: &Pipeline, submission: &Submission, plan: Vec<PlannedRegion>) -> Result<RunReport, RuntimeError> {
        let payload = submission.startup_payload().encode()?;
        let job_name = submission.job_name().map(str::to_string);

        info!(
            topology = %submission.topology(),
            job = job_name.as_deref().unwrap_or("unnamed"),
            regions = plan.len(),
            tuples = pipeline.source.len(),
            "job started"
        );

        let mut tuples = pipeline.source.clone();
        let mut regions = Vec::with_capacity(plan.len());

        for region in &plan {
            let tuples_in = tuples.len();
            tuples = run_region(region, &payload, tuples)?;
            debug!(region = %region.label, channels = region.channels.get(), tuples_in, tuples_out = tuples.len(), "region finished");
            regions.push(RegionReport {
                label: region.label.clone(),
                channels: region.channels.get(),
                tuples_in,
                tuples_out: tuples.len(),
            });
        }

        info!(job = job_name.as_deref().unwrap_or("unnamed"), outputs = tuples.len(), "job finished");

        Ok(RunReport {
            job_name,
            outputs: tuples,
            regions,
        })
    }
}

fn plan(pipeline: &Pipeline, bindings: &BindingSet) -> Result<Vec<PlannedRegion>, ParameterError> {
    let binder = StructuralBinder::new(bindings);
    let mut planned = Vec::with_capacity(pipeline.segments.len());

    for (index, segment) in pipeline.segments.iter().enumerate() {
        let (label, channels) = match &segment.width {
            Some(width) => (format!("parallel-{index}"), binder.resolve_width(width)?),
            None if segment.stages.is_empty() => continue,
            None => (format!("serial-{index}"), NonZeroU32::MIN),
        };

        let mut stages = Vec::with_capacity(segment.stages.len());
        for stage in &segment.stages {
            stages.push(PlannedStage {
                name: stage.name.clone(),
                params: binder.resolve_operator_params(&stage.params)?,
                factory: stage.factory.clone(),
            });
        }

        planned.push(PlannedRegion { label, channels, stages });
    }

    Ok(planned)
}

fn run_region(region: &PlannedRegion, payload: &str, tuples: Vec<Value>) -> Result<Vec<Value>, RuntimeError> {
    let width = region.channels.get() as usize;
    let mut partitions = vec![Vec::new(); width];
    for (index, tuple) in tuples.into_iter().enumerate() {
        partitions[index % width].push(tuple);
    }

    thread::scope(|scope| -> Result<Vec<Value>, RuntimeError> {
        let (workers, spawn_error) = take_until_error((0u32..).zip(partitions).map(|(channel, batch)| {
            thread::Builder::new()
                .name(format!("flowparam-{}-{channel}", region.label))
                .spawn_scoped(scope, move || run_worker(region, channel, payload, batch))
                .map(|worker| (channel, worker))
        }));

        // Join every spawned worker before inspecting results so a panic never escapes the scope.
        let joined: Vec<_> = workers.into_iter().map(|(channel, worker)| (channel, worker.join())).collect();

        if let Some(error) = spawn_error {
            warn!(region = %region.label, spawned = joined.len(), %error, "failed to spawn worker");
            return Err(RuntimeError::Spawn(error));
        }

        let mut outputs = Vec::new();
        for (channel, result) in joined {
            match result {
                Ok(Ok(produced)) => outputs.extend(produced),
                Ok(Err(source)) => {
                    warn!(region = %region.label, channel, error = %format!("{source:#}"), "worker failed");
                    return Err(RuntimeError::WorkerFailed {
                        region: region.label.clone(),
                        channel,
                        source,
                    });
                }
                Err(_) => {
                    warn!(region = %region.label, channel, "worker panicked");
                    return Err(RuntimeError::WorkerPanicked {
                        region: region.label.clone(),
                        channel,
                    });
                }
            }
        }
        Ok(outputs)
    })
}

/// Collects spawned workers, stopping at the first spawn failure.
fn take_until_error<T>(spawned: impl Iterator<Item = io::Result<T>>) -> (Vec<T>, Option<io::Error>) {
    let mut workers = Vec::new();
    for result in spawned {
        match result {
            Ok(worker) => workers.push(worker),
            Err(error) => return (workers, Some(error)),
        }
    }
    (workers, None)
}

fn run_worker(region: &PlannedRegion, channel: u32, payload: &str, batch: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    let context = ExecutionContext::decode(payload)
        .context("failed to decode startup payload")?
        .with_worker(region.label.as_str(), channel);
    let _guard = context.install();
    debug!(region = %region.label, channel, tuples = batch.len(), "worker started");

    let mut operators: Vec<Box<dyn Operator>> =
        region.stages.iter().map(|stage| (stage.factory)(&stage.params)).collect();
    let result = drive(&region.stages, &mut operators, batch);

    for operator in &mut operators {
        operator.close();
    }
    result
}

fn drive(stages: &[PlannedStage], operators: &mut [Box<dyn Operator>], batch: Vec<Value>) -> anyhow::Result<Vec<Value>> {
    for (stage, operator) in stages.iter().zip(operators.iter_mut()) {
        operator
            .open()
            .with_context(|| format!("operator '{}' failed to open", stage.name))?;
    }

    let mut outputs = Vec::new();
    for tuple in batch {
        let mut current = vec![tuple];
        for (stage, operator) in stages.iter().zip(operators.iter_mut()) {
            let mut next = Vec::with_capacity(current.len());
            for item in current {
                next.extend(
                    operator
                        .process(item)
                        .with_context(|| format!("operator '{}' failed to process a tuple", stage.name))?,
                );
            }
            current = next;
        }
        outputs.extend(current);
    }
    Ok(outputs)
}
