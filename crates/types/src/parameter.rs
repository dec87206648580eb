//! Submission parameter records shared by the engine, the local runtime, and the CLI.
//!
//! These types are pure data. Validation, coercion and resolution live in
//! `flowparam-engine`; everything here must stay serializable because binding sets
//! cross the boundary between the defining process and each worker.

use std::{error::Error, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Concrete type of a submission parameter.
///
/// Registration without an explicit type infers one of these from the default value,
/// so every stored [`ParameterSpec`] carries exactly one authoritative type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit floating point number.
    Float,
    /// `true` or `false`.
    Boolean,
}

impl ParamType {
    /// Returns the lowercase name used in manifests and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = ParseParamTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "rstring" => Ok(ParamType::String),
            "integer" | "int" | "int64" => Ok(ParamType::Integer),
            "float" | "float64" | "double" => Ok(ParamType::Float),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            _ => Err(ParseParamTypeError),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseParamTypeError;

impl fmt::Display for ParseParamTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid parameter type (expected string, integer, float or boolean)")
    }
}

impl Error for ParseParamTypeError {}

/// A concrete parameter value.
///
/// Serialized untagged so override mappings read naturally from YAML and JSON
/// (`lower: 7`, `greeting: hey`, `enabled: true`). Variant order matters for
/// deserialization: booleans and integers are tried before floats and strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ParamValue {
    /// Returns the type this value carries at runtime.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::String(_) => ParamType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Boolean(value) => write!(f, "{value}"),
            ParamValue::Integer(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Integer(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

/// Typed extraction from an already coerced [`ParamValue`].
///
/// Implementations match on the exact variant; callers coerce to
/// [`FromParamValue::PARAM_TYPE`] first.
pub trait FromParamValue: Sized {
    /// Type the value must be coerced to before extraction.
    const PARAM_TYPE: ParamType;

    fn from_param_value(value: &ParamValue) -> Option<Self>;
}

impl FromParamValue for String {
    const PARAM_TYPE: ParamType = ParamType::String;

    fn from_param_value(value: &ParamValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromParamValue for i64 {
    const PARAM_TYPE: ParamType = ParamType::Integer;

    fn from_param_value(value: &ParamValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FromParamValue for f64 {
    const PARAM_TYPE: ParamType = ParamType::Float;

    fn from_param_value(value: &ParamValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromParamValue for bool {
    const PARAM_TYPE: ParamType = ParamType::Boolean;

    fn from_param_value(value: &ParamValue) -> Option<Self> {
        value.as_bool()
    }
}

/// Declared identity of one submission parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpec {
    /// Unique key within one topology.
    pub name: String,
    /// Authoritative type, fixed at registration.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Fallback used when the submission supplies no override.
    ///
    /// `None` means the parameter must be supplied at submission time.
    #[serde(default)]
    pub default: Option<ParamValue>,
    /// Optional human-readable description. Not part of the declaration identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    /// Whether the submission must supply a value for this parameter.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Compares the declaration identity (`name`, type and default), ignoring the description.
    pub fn same_declaration(&self, other: &ParameterSpec) -> bool {
        self.name == other.name && self.param_type == other.param_type && self.default == other.default
    }
}

/// Where the value of a [`ResolvedBinding`] came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Supplied in the submission configuration.
    Override,
    /// Taken from the declared default.
    Default,
}

/// Association of a parameter name to its coerced value for one job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedBinding {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Value already coerced to `param_type`.
    pub value: ParamValue,
    pub origin: BindingOrigin,
    pub resolved_at: DateTime<Utc>,
}

/// Complete, immutable set of bindings for one job.
///
/// A binding set is only ever built whole: either every declared parameter resolved or
/// no set exists. There are no mutators after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindingSet {
    #[serde(default)]
    job_name: Option<String>,
    resolved_at: DateTime<Utc>,
    bindings: IndexMap<String, ResolvedBinding>,
}

impl BindingSet {
    /// Builds a binding set from fully resolved bindings, preserving their order.
    pub fn from_bindings(
        job_name: Option<String>,
        resolved_at: DateTime<Utc>,
        bindings: impl IntoIterator<Item = ResolvedBinding>,
    ) -> Self {
        Self {
            job_name,
            resolved_at,
            bindings: bindings.into_iter().map(|binding| (binding.name.clone(), binding)).collect(),
        }
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job_name.as_deref()
    }

    pub fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedBinding> {
        self.bindings.get(name)
    }

    /// Returns the bound value for `name`, if any.
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.bindings.get(name).map(|binding| &binding.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedBinding> {
        self.bindings.values()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Projects the binding set onto the payload shipped to every worker at startup.
    pub fn startup_payload(&self) -> StartupPayload {
        StartupPayload {
            job_name: self.job_name.clone(),
            values: self
                .bindings
                .iter()
                .map(|(name, binding)| (name.clone(), binding.value.clone()))
                .collect(),
        }
    }
}

/// The part of a [`BindingSet`] that crosses the process boundary.
///
/// Only names and values travel; handle objects never do. Workers rebuild their
/// execution context from this payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StartupPayload {
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub values: IndexMap<String, ParamValue>,
}

impl StartupPayload {
    /// Encodes the payload as compact JSON.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(encoded: &str) -> serde_json::Result<Self> {
        serde_json::from_str(encoded)
    }
}
