//! Topology-owned parameter registry and the submission step.
//!
//! Each [`Topology`] owns exactly one [`ParameterRegistry`]; there is no process-wide
//! registry. Submitting validates the job configuration, commits the bindings to the
//! registry, and yields a [`Submission`] whose startup payload is what workers receive.

use flowparam_types::{BindingSet, ParamType, ParamValue, ParameterManifest, StartupPayload, SubmissionConfig};
use tracing::info;

use crate::{binder::ConfigBinder, error::ParameterError, handle::ParameterHandle, registry::ParameterRegistry};

/// A graph definition's parameter scope.
#[derive(Debug)]
pub struct Topology {
    name: String,
    registry: ParameterRegistry,
    binder: ConfigBinder,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: ParameterRegistry::new(),
            binder: ConfigBinder::new(),
        }
    }

    /// Builds a topology whose parameters come from a declarative manifest.
    pub fn from_manifest(manifest: &ParameterManifest) -> Result<Self, ParameterError> {
        let mut topology = Self::new(manifest.topology.clone().unwrap_or_else(|| "default".to_string()));
        for (name, declaration) in &manifest.parameters {
            topology.registry.register_declaration(name, declaration)?;
        }
        Ok(topology)
    }

    /// Replaces the binder used by [`submit`](Self::submit) and [`preflight`](Self::preflight).
    pub fn with_binder(mut self, binder: ConfigBinder) -> Self {
        self.binder = binder;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a submission parameter and returns its handle.
    ///
    /// See [`ParameterRegistry::register`] for type inference and conflict rules.
    pub fn create_submission_parameter(
        &mut self,
        name: &str,
        default: Option<ParamValue>,
        param_type: Option<ParamType>,
    ) -> Result<ParameterHandle, ParameterError> {
        self.registry.register(name, default, param_type)
    }

    pub fn parameters(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Validates a job configuration without committing anything.
    pub fn preflight(&self, config: &SubmissionConfig) -> Result<BindingSet, ParameterError> {
        self.binder.bind(&self.registry, config)
    }

    /// Validates, coerces, and commits a job configuration.
    ///
    /// On error nothing is committed and no worker may be started.
    pub fn submit(&self, config: &SubmissionConfig) -> Result<Submission, ParameterError> {
        let bindings = self.binder.bind(&self.registry, config)?;
        self.commit(bindings)
    }

    /// Commits a binding set produced by [`preflight`](Self::preflight).
    ///
    /// Callers that must check structural values against the bindings do so between
    /// `preflight` and `commit`, so a rejected job never leaves handles bound.
    pub fn commit(&self, bindings: BindingSet) -> Result<Submission, ParameterError> {
        self.registry.commit(&bindings)?;
        info!(
            topology = %self.name,
            job = bindings.job_name().unwrap_or("unnamed"),
            parameters = bindings.len(),
            "topology submitted"
        );
        Ok(Submission {
            topology: self.name.clone(),
            bindings,
        })
    }
}

/// An accepted submission: the topology name plus its complete binding set.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    topology: String,
    bindings: BindingSet,
}

impl Submission {
    pub fn topology(&self) -> &str {
        &self.topology
    }

    pub fn job_name(&self) -> Option<&str> {
        self.bindings.job_name()
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn startup_payload(&self) -> StartupPayload {
        self.bindings.startup_payload()
    }
}
