//! In-worker lookup of submission parameter values by name.
//!
//! Code that runs inside a worker often cannot hold the
//! [`ParameterHandle`](crate::ParameterHandle) returned at registration: closures shipped to another process
//! carry only the parameter name. [`resolve`] looks that name up in the worker's
//! installed [`ExecutionContext`].

use std::sync::Arc;

use flowparam_types::{FromParamValue, ParamType, ParamValue};
use tracing::error;

use crate::{
    coerce::coerce,
    context::ExecutionContext,
    error::ParameterError,
    handle::{ParameterScope, typed},
};

/// Name-based resolver bound to one worker context.
#[derive(Debug, Clone)]
pub struct RuntimeResolver {
    context: Arc<ExecutionContext>,
}

impl RuntimeResolver {
    pub fn new(context: Arc<ExecutionContext>) -> Self {
        Self { context }
    }

    /// Binds to the context installed on the current thread.
    ///
    /// `name` is only used to label the error when no context is installed.
    pub fn current(name: &str) -> Result<Self, ParameterError> {
        ExecutionContext::current()
            .map(Self::new)
            .ok_or_else(|| ParameterError::no_execution_context(name))
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Looks up `name`, coercing to `param_type` when given.
    ///
    /// # Errors
    ///
    /// - [`ParameterError::Unknown`] when the job never bound `name`. This is a defect in
    ///   the calling code and is not retried.
    /// - [`ParameterError::TypeMismatch`] when the bound value cannot be coerced.
    pub fn resolve(&self, name: &str, param_type: Option<ParamType>) -> Result<ParamValue, ParameterError> {
        let Some(value) = self.context.get(name) else {
            error!(
                parameter = %name,
                job = self.context.job_name().unwrap_or("unnamed"),
                region = self.context.region().unwrap_or("main"),
                "unknown submission parameter requested by worker"
            );
            return Err(ParameterError::unknown(name));
        };

        match param_type {
            Some(target) => coerce(name, value, target),
            None => Ok(value.clone()),
        }
    }

    pub fn resolve_as<T: FromParamValue>(&self, name: &str) -> Result<T, ParameterError> {
        typed(name, &self.resolve(name, None)?)
    }

    /// Resolves once and returns a scope holding the value.
    pub fn scope(&self, name: &str, param_type: Option<ParamType>) -> Result<ParameterScope, ParameterError> {
        Ok(ParameterScope::new(name, self.resolve(name, param_type)?))
    }
}

/// Resolves `name` against the current worker's context.
///
/// # Errors
///
/// [`ParameterError::NoExecutionContext`] outside a worker, otherwise as
/// [`RuntimeResolver::resolve`].
pub fn resolve(name: &str, param_type: Option<ParamType>) -> Result<ParamValue, ParameterError> {
    RuntimeResolver::current(name)?.resolve(name, param_type)
}

/// Typed form of [`resolve`].
pub fn resolve_as<T: FromParamValue>(name: &str) -> Result<T, ParameterError> {
    RuntimeResolver::current(name)?.resolve_as(name)
}

/// Scoped form of [`resolve`], for operators that capture values when they open.
pub fn scope(name: &str, param_type: Option<ParamType>) -> Result<ParameterScope, ParameterError> {
    RuntimeResolver::current(name)?.scope(name, param_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowparam_types::StartupPayload;

    fn install(values: &[(&str, ParamValue)]) -> crate::context::ContextGuard {
        ExecutionContext::from_payload(StartupPayload {
            job_name: Some("ec-job".into()),
            values: values.iter().map(|(name, value)| (name.to_string(), value.clone())).collect(),
        })
        .install()
    }

    #[test]
    fn resolves_bound_values_with_optional_coercion() {
        let _guard = install(&[("modulo", ParamValue::Integer(5)), ("p1", ParamValue::from("Rolef"))]);

        assert_eq!(resolve("p1", None), Ok(ParamValue::from("Rolef")));
        assert_eq!(resolve("modulo", Some(ParamType::Integer)), Ok(ParamValue::Integer(5)));
        assert_eq!(resolve("modulo", Some(ParamType::Float)), Ok(ParamValue::Float(5.0)));
        assert_eq!(resolve_as::<i64>("modulo"), Ok(5));
    }

    #[test]
    fn unknown_name_is_a_hard_error() {
        let _guard = install(&[("w1", ParamValue::Integer(3))]);
        assert_eq!(resolve("w2", Some(ParamType::Integer)), Err(ParameterError::unknown("w2")));
    }

    #[test]
    fn outside_a_worker_there_is_no_context() {
        assert_eq!(resolve("w1", None), Err(ParameterError::no_execution_context("w1")));
    }

    #[test]
    fn coercion_failure_is_type_mismatch() {
        let _guard = install(&[("p1", ParamValue::from("Rolef"))]);
        assert!(matches!(resolve_as::<bool>("p1"), Err(ParameterError::TypeMismatch { .. })));
    }

    #[test]
    fn scope_exposes_resolved_value() {
        let _guard = install(&[("pTrue", ParamValue::Boolean(true))]);
        let scope = scope("pTrue", Some(ParamType::Boolean)).expect("scope");
        assert_eq!(scope.get_as::<bool>(), Ok(true));
    }

    #[test]
    fn explicit_resolver_reads_its_own_context() {
        let context = Arc::new(
            ExecutionContext::decode(r#"{"values":{"w1":3}}"#)
                .expect("decode")
                .with_worker("region-0", 1),
        );
        let resolver = RuntimeResolver::new(context);
        assert_eq!(resolver.resolve_as::<i64>("w1"), Ok(3));
        assert_eq!(resolver.context().channel(), Some(1));
    }
}
