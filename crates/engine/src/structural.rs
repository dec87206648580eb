//! Submission parameters in structural graph positions.
//!
//! A parallel region's width and an operator's declared parameters accept either a
//! literal or a [`ParameterHandle`]. Unlike per-tuple reads, structural values decide
//! how many workers or operator instances exist, so they are resolved against the
//! job's [`BindingSet`] before the region is instantiated, never lazily.

use std::num::NonZeroU32;

use flowparam_types::{BindingSet, ParamValue};
use indexmap::IndexMap;
use tracing::debug;

use crate::{error::ParameterError, handle::ParameterHandle};

/// A configuration value that is either fixed in the graph or supplied at submission.
#[derive(Debug, Clone)]
pub enum StructuralValue<T> {
    Literal(T),
    Parameter(ParameterHandle),
}

/// Fan-out width of a parallel region.
pub type ParallelWidth = StructuralValue<u32>;

/// Value of one declared operator parameter.
pub type OperatorParam = StructuralValue<ParamValue>;

impl<T> StructuralValue<T> {
    /// Name of the backing submission parameter, if any.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            StructuralValue::Literal(_) => None,
            StructuralValue::Parameter(handle) => Some(handle.name()),
        }
    }
}

impl<T> From<ParameterHandle> for StructuralValue<T> {
    fn from(handle: ParameterHandle) -> Self {
        StructuralValue::Parameter(handle)
    }
}

impl<T> From<&ParameterHandle> for StructuralValue<T> {
    fn from(handle: &ParameterHandle) -> Self {
        StructuralValue::Parameter(handle.clone())
    }
}

impl From<u32> for ParallelWidth {
    fn from(width: u32) -> Self {
        StructuralValue::Literal(width)
    }
}

impl From<ParamValue> for OperatorParam {
    fn from(value: ParamValue) -> Self {
        StructuralValue::Literal(value)
    }
}

impl From<&str> for OperatorParam {
    fn from(value: &str) -> Self {
        StructuralValue::Literal(ParamValue::from(value))
    }
}

impl From<i64> for OperatorParam {
    fn from(value: i64) -> Self {
        StructuralValue::Literal(ParamValue::from(value))
    }
}

impl From<f64> for OperatorParam {
    fn from(value: f64) -> Self {
        StructuralValue::Literal(ParamValue::from(value))
    }
}

impl From<bool> for OperatorParam {
    fn from(value: bool) -> Self {
        StructuralValue::Literal(ParamValue::from(value))
    }
}

/// Resolves structural values against a job's binding set ahead of instantiation.
#[derive(Debug, Clone, Copy)]
pub struct StructuralBinder<'bindings> {
    bindings: &'bindings BindingSet,
}

impl<'bindings> StructuralBinder<'bindings> {
    pub fn new(bindings: &'bindings BindingSet) -> Self {
        Self { bindings }
    }

    /// Resolves a parallel width to a positive channel count.
    ///
    /// # Errors
    ///
    /// [`ParameterError::Structural`] when the width is zero, negative, not an integer,
    /// too large, or backed by a parameter missing from the binding set.
    pub fn resolve_width(&self, width: &ParallelWidth) -> Result<NonZeroU32, ParameterError> {
        let (name, raw) = match width {
            StructuralValue::Literal(literal) => ("<literal width>", i64::from(*literal)),
            StructuralValue::Parameter(handle) => {
                let value = self.bound_value(handle)?;
                let ParamValue::Integer(number) = value else {
                    return Err(ParameterError::structural(
                        handle.name(),
                        format!("parallel width must be an integer, got {} {value}", value.param_type()),
                    ));
                };
                (handle.name(), *number)
            }
        };

        let channels = u32::try_from(raw)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| ParameterError::structural(name, format!("parallel width must be a positive integer, got {raw}")))?;

        debug!(parameter = name, width = channels.get(), "parallel width resolved");
        Ok(channels)
    }

    /// Resolves one operator parameter value.
    pub fn resolve_operator_param(&self, value: &OperatorParam) -> Result<ParamValue, ParameterError> {
        match value {
            StructuralValue::Literal(literal) => Ok(literal.clone()),
            StructuralValue::Parameter(handle) => self.bound_value(handle).cloned(),
        }
    }

    /// Resolves every declared operator parameter, preserving declaration order.
    pub fn resolve_operator_params(
        &self,
        params: &IndexMap<String, OperatorParam>,
    ) -> Result<IndexMap<String, ParamValue>, ParameterError> {
        let mut resolved = IndexMap::with_capacity(params.len());
        for (param_name, value) in params {
            resolved.insert(param_name.clone(), self.resolve_operator_param(value)?);
        }
        Ok(resolved)
    }

    fn bound_value(&self, handle: &ParameterHandle) -> Result<&'bindings ParamValue, ParameterError> {
        self.bindings.value(handle.name()).ok_or_else(|| {
            ParameterError::structural(
                handle.name(),
                "structural parameter must be bound before its graph region is instantiated",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{binder::ConfigBinder, registry::ParameterRegistry};
    use flowparam_types::{ParamType, SubmissionConfig};

    fn bind(registry: &ParameterRegistry, config: SubmissionConfig) -> BindingSet {
        ConfigBinder::new().bind(registry, &config).expect("bind")
    }

    #[test]
    fn width_from_parameter() {
        let mut registry = ParameterRegistry::new();
        let w1 = registry.register("w1", None, Some(ParamType::Integer)).expect("register");
        let bindings = bind(&registry, SubmissionConfig::new().with_parameter("w1", "3"));

        let width = StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(w1)).expect("width");
        assert_eq!(width.get(), 3);
    }

    #[test]
    fn literal_width_passes_through() {
        let registry = ParameterRegistry::new();
        let bindings = bind(&registry, SubmissionConfig::new());
        let width = StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(4)).expect("width");
        assert_eq!(width.get(), 4);
    }

    #[test]
    fn non_positive_widths_are_structural_errors() {
        let mut registry = ParameterRegistry::new();
        let w1 = registry.register("w1", None, Some(ParamType::Integer)).expect("register");
        let binder_input = [0, -2];

        for raw in binder_input {
            let bindings = bind(&registry, SubmissionConfig::new().with_parameter("w1", raw));
            let error = StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(&w1)).unwrap_err();
            assert!(matches!(error, ParameterError::Structural { ref name, .. } if name == "w1"), "{raw}: {error}");
        }

        let bindings = bind(&registry, SubmissionConfig::new().with_parameter("w1", 1));
        assert!(StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(0)).is_err());
    }

    #[test]
    fn non_integer_width_is_structural_error() {
        let mut registry = ParameterRegistry::new();
        let ratio = registry.register("ratio", Some(1.5.into()), None).expect("register");
        let bindings = bind(&registry, SubmissionConfig::new());

        let error = StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(ratio)).unwrap_err();
        assert!(matches!(error, ParameterError::Structural { .. }));
    }

    #[test]
    fn unbound_structural_parameter_fails_before_instantiation() {
        let mut other = ParameterRegistry::new();
        let foreign = other.register("w9", Some(2.into()), None).expect("register");
        let bindings = bind(&ParameterRegistry::new(), SubmissionConfig::new());

        let error = StructuralBinder::new(&bindings).resolve_width(&ParallelWidth::from(foreign)).unwrap_err();
        assert!(matches!(error, ParameterError::Structural { ref name, .. } if name == "w9"));
    }

    #[test]
    fn operator_params_mix_literals_and_parameters() {
        let mut registry = ParameterRegistry::new();
        let topic = registry.register("mytopic", None, None).expect("register");
        let bindings = bind(&registry, SubmissionConfig::new().with_parameter("mytopic", "topology/test"));

        let mut params = IndexMap::new();
        params.insert("topic".to_string(), OperatorParam::from(topic));
        params.insert("period".to_string(), OperatorParam::from(0.02));

        let resolved = StructuralBinder::new(&bindings).resolve_operator_params(&params).expect("resolve");
        assert_eq!(resolved["topic"], ParamValue::from("topology/test"));
        assert_eq!(resolved["period"], ParamValue::Float(0.02));
    }
}
