//! Error types for submission parameter definition, binding, and resolution.

use flowparam_types::ParamType;
use thiserror::Error;

/// Errors raised by the parameter subsystem.
///
/// Definition-time and submission-time variants surface synchronously to the caller
/// before any worker starts. `Unknown` is raised inside a running worker and is always
/// a programming defect; it is never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("parameter '{name}' conflicts with an existing registration: {reason}")]
    Conflict { name: String, reason: String },

    #[error("missing submission parameter(s) with no default: {}", names.join(", "))]
    Missing { names: Vec<String> },

    #[error("submission parameter '{name}' cannot be coerced to {expected}: {found}")]
    TypeMismatch { name: String, expected: ParamType, found: String },

    #[error("structural parameter '{name}' is invalid: {reason}")]
    Structural { name: String, reason: String },

    #[error("unknown submission parameter '{name}'")]
    Unknown { name: String },

    #[error("submission parameter '{name}' has not been resolved")]
    Unresolved { name: String },

    #[error("submission parameter '{name}' is already bound to a different value")]
    AlreadyBound { name: String },

    #[error("no worker execution context is installed on this thread (looking up '{name}')")]
    NoExecutionContext { name: String },
}

impl ParameterError {
    pub fn conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(names: Vec<String>) -> Self {
        Self::Missing { names }
    }

    pub fn type_mismatch(name: impl Into<String>, expected: ParamType, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            found: found.into(),
        }
    }

    pub fn structural(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Structural {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::Unknown { name: name.into() }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::Unresolved { name: name.into() }
    }

    pub fn already_bound(name: impl Into<String>) -> Self {
        Self::AlreadyBound { name: name.into() }
    }

    pub fn no_execution_context(name: impl Into<String>) -> Self {
        Self::NoExecutionContext { name: name.into() }
    }
}
