//! Shared type definitions for Flowparam submission parameters.
//!
//! - [`parameter`]: parameter types, values, specs, and resolved binding sets
//! - [`submission`]: job configuration and parameter manifests

pub mod parameter;
pub mod submission;

pub use parameter::{
    BindingOrigin, BindingSet, FromParamValue, ParamType, ParamValue, ParameterSpec, ParseParamTypeError, ResolvedBinding,
    StartupPayload,
};
pub use submission::{ParameterDeclaration, ParameterManifest, SubmissionConfig};
