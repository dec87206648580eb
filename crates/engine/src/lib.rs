//! # Flowparam Engine
//!
//! Submission-time parameters for dataflow topologies. Graph code declares parameters
//! up front and receives placeholder handles; each job submission supplies values that
//! are validated, coerced, and made visible to every worker before it starts.
//!
//! ## Usage
//!
//! ```rust
//! use flowparam_engine::{ParamType, SubmissionConfig, Topology};
//!
//! let mut topology = Topology::new("bounds");
//! let width = topology.create_submission_parameter("width", Some(2.into()), Some(ParamType::Integer))?;
//!
//! let submission = topology.submit(&SubmissionConfig::new().with_parameter("width", "4"))?;
//! assert_eq!(width.get_as::<i64>(), Some(4));
//! assert_eq!(submission.bindings().len(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`registry`** / **`handle`**: declaration and the placeholders graph code captures
//! - **`binder`** / **`coerce`**: submission-time validation of overrides
//! - **`context`** / **`resolver`**: worker-local values and by-name lookup
//! - **`structural`**: parallel widths and operator parameters backed by submission parameters
//! - **`topology`**: the owner of one registry and the submission step
//! - **`local`**: an in-process runtime for running graphs end to end

use std::{env, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};

pub mod binder;
pub mod coerce;
pub mod context;
pub mod error;
pub mod handle;
pub mod local;
pub mod registry;
pub mod resolver;
pub mod structural;
pub mod topology;

pub use binder::ConfigBinder;
pub use context::{ContextGuard, ExecutionContext};
pub use error::ParameterError;
pub use flowparam_types::{
    BindingOrigin, BindingSet, FromParamValue, ParamType, ParamValue, ParameterDeclaration, ParameterManifest, ParameterSpec,
    ResolvedBinding, StartupPayload, SubmissionConfig,
};
pub use handle::{ParameterHandle, ParameterScope};
pub use local::{LocalRuntime, Operator, OperatorFactory, Pipeline, RegionReport, RunReport, RuntimeError, operator_factory};
pub use registry::ParameterRegistry;
pub use resolver::{RuntimeResolver, resolve, resolve_as};
pub use structural::{OperatorParam, ParallelWidth, StructuralBinder, StructuralValue};
pub use topology::{Submission, Topology};

/// Environment variable naming the job configuration file used when none is passed explicitly.
pub const JOB_CONFIG_ENV: &str = "FLOWPARAM_JOB_CONFIG";

/// Loads a job configuration from a YAML or JSON file.
///
/// # Errors
///
/// Fails when the file cannot be read or does not describe a job configuration.
pub fn parse_submission_file(file_path: impl AsRef<Path>) -> Result<SubmissionConfig> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read job configuration: {}", file_path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid job configuration: {}", file_path.display()))
}

/// Loads a parameter manifest from a YAML or JSON file.
///
/// ```rust
/// use flowparam_engine::{parse_manifest_file, Topology};
///
/// let temp_dir = tempfile::tempdir()?;
/// let manifest_path = temp_dir.path().join("params.yaml");
/// std::fs::write(&manifest_path, r#"
/// topology: bounds
/// parameters:
///   lower:
///     default: 0
///   upper:
///     type: integer
/// "#)?;
///
/// let manifest = parse_manifest_file(&manifest_path)?;
/// let topology = Topology::from_manifest(&manifest)?;
/// assert_eq!(topology.parameters().len(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_manifest_file(file_path: impl AsRef<Path>) -> Result<ParameterManifest> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read parameter manifest: {}", file_path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("Invalid parameter manifest: {}", file_path.display()))
}

/// Picks the job configuration file: the explicit path, else [`JOB_CONFIG_ENV`].
pub fn job_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    select_config_path(explicit, env::var(JOB_CONFIG_ENV).ok())
}

fn select_config_path(explicit: Option<PathBuf>, from_env: Option<String>) -> Option<PathBuf> {
    explicit.or_else(|| from_env.filter(|path| !path.trim().is_empty()).map(PathBuf::from))
}
