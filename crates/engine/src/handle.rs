//! Callable placeholders for submission parameters.
//!
//! A [`ParameterHandle`] is what graph-building code receives from registration. It
//! can be captured by per-tuple logic or passed as a structural value, and answers
//! with the bound value once one exists.

use std::{
    fmt,
    ops::Deref,
    sync::{Arc, OnceLock},
};

use flowparam_types::{FromParamValue, ParamType, ParamValue, ParameterSpec};
use tracing::warn;

use crate::{coerce::coerce, context::ExecutionContext, error::ParameterError};

/// Placeholder for one submission parameter.
///
/// Resolution order on every read:
///
/// 1. the value cached by an earlier successful resolution through this handle,
/// 2. the worker [`ExecutionContext`] installed on the current thread,
/// 3. the value committed to the owning registry at submission,
/// 4. the declared default (not cached),
/// 5. nothing (`None` from [`get`](Self::get), an error from [`try_get`](Self::try_get)).
///
/// Cloning produces a handle with an empty cache, matching a copy that is shipped to
/// another execution context.
pub struct ParameterHandle {
    spec: Arc<ParameterSpec>,
    committed: Arc<OnceLock<ParamValue>>,
    cache: OnceLock<ParamValue>,
}

enum Lookup {
    Resolved(ParamValue),
    Default(ParamValue),
    MissingInWorker,
    Unresolved,
}

impl ParameterHandle {
    pub(crate) fn new(spec: Arc<ParameterSpec>, committed: Arc<OnceLock<ParamValue>>) -> Self {
        Self {
            spec,
            committed,
            cache: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    pub fn param_type(&self) -> ParamType {
        self.spec.param_type
    }

    pub fn default_value(&self) -> Option<&ParamValue> {
        self.spec.default.as_ref()
    }

    /// Whether a submission has committed a value for this parameter.
    pub fn is_bound(&self) -> bool {
        self.committed.get().is_some()
    }

    /// Returns the resolved value, else the default, else `None`.
    ///
    /// `None` is only meaningful for pre-flight inspection in the defining process.
    /// Inside a worker whose context does not know this parameter the call logs a
    /// warning and falls back to the default; use [`try_get`](Self::try_get) to surface
    /// that as an error.
    pub fn get(&self) -> Option<ParamValue> {
        match self.lookup() {
            Lookup::Resolved(value) | Lookup::Default(value) => Some(value),
            Lookup::MissingInWorker => {
                warn!(parameter = %self.name(), "submission parameter missing from worker context");
                self.spec.default.clone()
            }
            Lookup::Unresolved => None,
        }
    }

    /// Returns the resolved value or the default, failing when neither exists.
    ///
    /// # Errors
    ///
    /// - [`ParameterError::Unknown`] inside a worker whose context has no binding for
    ///   this name.
    /// - [`ParameterError::Unresolved`] outside a worker when nothing is committed and
    ///   there is no default.
    pub fn try_get(&self) -> Result<ParamValue, ParameterError> {
        match self.lookup() {
            Lookup::Resolved(value) | Lookup::Default(value) => Ok(value),
            Lookup::MissingInWorker => Err(ParameterError::unknown(self.name())),
            Lookup::Unresolved => Err(ParameterError::unresolved(self.name())),
        }
    }

    /// Typed variant of [`try_get`](Self::try_get), coercing to `T`'s parameter type.
    pub fn try_get_as<T: FromParamValue>(&self) -> Result<T, ParameterError> {
        typed(self.name(), &self.try_get()?)
    }

    /// Typed variant of [`get`](Self::get). Values that cannot be coerced to `T` yield `None`.
    pub fn get_as<T: FromParamValue>(&self) -> Option<T> {
        self.get().and_then(|value| typed(self.name(), &value).ok())
    }

    /// Resolves once and returns a scope exposing the value.
    ///
    /// Operators acquire a scope when they open and read from it for every tuple, so
    /// the lookup happens once per scope regardless of tuple count.
    pub fn scope(&self) -> Result<ParameterScope, ParameterError> {
        Ok(ParameterScope::new(self.name(), self.try_get()?))
    }

    fn lookup(&self) -> Lookup {
        if let Some(value) = self.cache.get() {
            return Lookup::Resolved(value.clone());
        }

        if let Some(context) = ExecutionContext::current() {
            return match context.get(self.name()) {
                Some(value) => Lookup::Resolved(self.cache.get_or_init(|| value.clone()).clone()),
                None => Lookup::MissingInWorker,
            };
        }

        if let Some(value) = self.committed.get() {
            return Lookup::Resolved(self.cache.get_or_init(|| value.clone()).clone());
        }

        match &self.spec.default {
            Some(default) => Lookup::Default(default.clone()),
            None => Lookup::Unresolved,
        }
    }
}

impl Clone for ParameterHandle {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.spec), Arc::clone(&self.committed))
    }
}

impl fmt::Debug for ParameterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterHandle")
            .field("name", &self.spec.name)
            .field("type", &self.spec.param_type)
            .field("bound", &self.is_bound())
            .field("cached", &self.cache.get())
            .finish()
    }
}

/// A value captured once for the duration of a processing scope.
///
/// Dropping the scope releases nothing; the value is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterScope {
    name: String,
    value: ParamValue,
}

impl ParameterScope {
    pub(crate) fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self { name: name.into(), value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn get_as<T: FromParamValue>(&self) -> Result<T, ParameterError> {
        typed(&self.name, &self.value)
    }

    pub fn into_value(self) -> ParamValue {
        self.value
    }
}

impl Deref for ParameterScope {
    type Target = ParamValue;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

pub(crate) fn typed<T: FromParamValue>(name: &str, value: &ParamValue) -> Result<T, ParameterError> {
    let coerced = coerce(name, value, T::PARAM_TYPE)?;
    T::from_param_value(&coerced).ok_or_else(|| ParameterError::type_mismatch(name, T::PARAM_TYPE, coerced.to_string()))
}
