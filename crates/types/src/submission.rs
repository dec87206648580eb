//! Submission-time configuration documents.
//!
//! [`SubmissionConfig`] is the job configuration payload handed to the binder: an
//! optional job name plus the raw override mapping. [`ParameterManifest`] declares a
//! topology's parameters in YAML/JSON so they can be checked without compiling the
//! graph that uses them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parameter::{ParamType, ParamValue};

/// Job configuration supplied when a topology is submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubmissionConfig {
    /// Optional name for the submitted job, propagated to worker contexts and logs.
    #[serde(default)]
    pub job_name: Option<String>,
    /// Raw override values keyed by parameter name.
    ///
    /// Values are coerced to each parameter's declared type at bind time, so a
    /// string `"7"` is a valid override for an integer parameter.
    #[serde(default)]
    pub submission_parameters: IndexMap<String, ParamValue>,
}

impl SubmissionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job name, returning the updated configuration.
    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = Some(job_name.into());
        self
    }

    /// Adds or replaces an override, returning the updated configuration.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_parameter(name, value);
        self
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.submission_parameters.insert(name.into(), value.into());
    }

    /// Merges `other` into this configuration.
    ///
    /// Overrides in `other` replace existing values for the same name; a job name in
    /// `other` replaces the current one.
    pub fn add(&mut self, other: &SubmissionConfig) {
        if let Some(job_name) = &other.job_name {
            self.job_name = Some(job_name.clone());
        }
        for (name, value) in &other.submission_parameters {
            self.submission_parameters.insert(name.clone(), value.clone());
        }
    }
}

/// Declarative list of the parameters a topology exposes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterManifest {
    /// Optional topology name.
    #[serde(default)]
    pub topology: Option<String>,
    /// Parameter declarations keyed by name, preserving authoring order.
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterDeclaration>,
}

/// One declared parameter inside a [`ParameterManifest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ParameterDeclaration {
    /// Declared type. Absent means inferred from `default` (string when there is none).
    #[serde(default, rename = "type")]
    pub r#type: Option<ParamType>,
    #[serde(default)]
    pub default: Option<ParamValue>,
    #[serde(default)]
    pub description: Option<String>,
}
