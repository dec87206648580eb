//! Submission-time validation and coercion of parameter overrides.
//!
//! [`ConfigBinder`] turns a [`SubmissionConfig`] and a [`ParameterRegistry`] into a
//! complete [`BindingSet`], or rejects the submission. There is no partial result:
//! a job never starts with any parameter unresolved.

use chrono::Utc;
use flowparam_types::{BindingOrigin, BindingSet, ParamValue, ResolvedBinding, SubmissionConfig};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::{coerce::coerce, error::ParameterError, registry::ParameterRegistry};

/// Validates submission overrides against declared parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigBinder {
    strict: bool,
}

impl ConfigBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects overrides naming parameters the registry never declared.
    ///
    /// By default such overrides are ignored with a warning, since one job
    /// configuration is commonly shared by several topologies.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Resolves every declared parameter for a submission.
    ///
    /// For each spec, in declaration order: an override is coerced to the declared type;
    /// without an override the default is used; with neither the parameter is missing.
    ///
    /// # Errors
    ///
    /// - [`ParameterError::TypeMismatch`] for the first override that cannot be coerced.
    /// - [`ParameterError::Missing`] naming every parameter with no override and no default.
    /// - [`ParameterError::Unknown`] in strict mode, for an override with no declaration.
    pub fn bind(&self, registry: &ParameterRegistry, config: &SubmissionConfig) -> Result<BindingSet, ParameterError> {
        let job_name = config.job_name.as_deref().unwrap_or("unnamed");
        let result = self.resolve_all(registry, config);

        match &result {
            Ok(bindings) => info!(
                job = job_name,
                parameters = bindings.len(),
                overrides = bindings.iter().filter(|binding| binding.origin == BindingOrigin::Override).count(),
                "submission parameters bound"
            ),
            Err(error) => warn!(job = job_name, %error, "submission rejected"),
        }

        result
    }

    /// Convenience form of [`bind`](Self::bind) for a bare override mapping.
    pub fn bind_overrides(
        &self,
        registry: &ParameterRegistry,
        overrides: &IndexMap<String, ParamValue>,
    ) -> Result<BindingSet, ParameterError> {
        let config = SubmissionConfig {
            job_name: None,
            submission_parameters: overrides.clone(),
        };
        self.bind(registry, &config)
    }

    fn resolve_all(&self, registry: &ParameterRegistry, config: &SubmissionConfig) -> Result<BindingSet, ParameterError> {
        let overrides = &config.submission_parameters;

        for name in overrides.keys().filter(|name| !registry.contains(name)) {
            if self.strict {
                return Err(ParameterError::unknown(name.clone()));
            }
            warn!(parameter = %name, "ignoring override for undeclared submission parameter");
        }

        let resolved_at = Utc::now();
        let mut bindings = Vec::with_capacity(registry.len());
        let mut missing = Vec::new();

        for spec in registry.specs() {
            let (value, origin) = match (overrides.get(&spec.name), &spec.default) {
                (Some(raw), _) => (coerce(&spec.name, raw, spec.param_type)?, BindingOrigin::Override),
                (None, Some(default)) => (default.clone(), BindingOrigin::Default),
                (None, None) => {
                    missing.push(spec.name.clone());
                    continue;
                }
            };

            bindings.push(ResolvedBinding {
                name: spec.name.clone(),
                param_type: spec.param_type,
                value,
                origin,
                resolved_at,
            });
        }

        if !missing.is_empty() {
            return Err(ParameterError::missing(missing));
        }

        Ok(BindingSet::from_bindings(config.job_name.clone(), resolved_at, bindings))
    }
}
