//! Topology-scoped store of submission parameter declarations.
//!
//! A registry is owned by exactly one topology and lives as long as it does. It mints
//! [`ParameterHandle`]s, enforces name uniqueness and type consistency at definition
//! time, and receives the committed binding set once a submission has been validated.

use std::sync::{Arc, OnceLock};

use flowparam_types::{BindingSet, ParamType, ParamValue, ParameterDeclaration, ParameterSpec};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{error::ParameterError, handle::ParameterHandle};

#[derive(Debug)]
struct RegistryEntry {
    spec: Arc<ParameterSpec>,
    committed: Arc<OnceLock<ParamValue>>,
}

impl RegistryEntry {
    fn handle(&self) -> ParameterHandle {
        ParameterHandle::new(Arc::clone(&self.spec), Arc::clone(&self.committed))
    }
}

/// Declaration-ordered set of parameter specs for one topology.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter and returns its handle.
    ///
    /// When `declared_type` is `None` the type is inferred from `default`; a parameter
    /// with neither is a string. Registering the same name again with an identical
    /// type and default returns a handle to the existing parameter.
    ///
    /// # Errors
    ///
    /// [`ParameterError::Conflict`] when the name is blank, when `default` does not have
    /// the declared type, when a float default is not finite, or when the name is
    /// already registered with a different type or default.
    pub fn register(
        &mut self,
        name: &str,
        default: Option<ParamValue>,
        declared_type: Option<ParamType>,
    ) -> Result<ParameterHandle, ParameterError> {
        self.register_spec(build_spec(name, default, declared_type, None)?)
    }

    /// Registers a parameter from a manifest declaration.
    pub fn register_declaration(&mut self, name: &str, declaration: &ParameterDeclaration) -> Result<ParameterHandle, ParameterError> {
        let spec = build_spec(
            name,
            declaration.default.clone(),
            declaration.r#type,
            declaration.description.clone(),
        )?;
        self.register_spec(spec)
    }

    fn register_spec(&mut self, spec: ParameterSpec) -> Result<ParameterHandle, ParameterError> {
        if let Some(existing) = self.entries.get(&spec.name) {
            if existing.spec.same_declaration(&spec) {
                debug!(parameter = %spec.name, "submission parameter re-registered identically");
                return Ok(existing.handle());
            }
            warn!(
                parameter = %spec.name,
                existing_type = %existing.spec.param_type,
                requested_type = %spec.param_type,
                "conflicting submission parameter registration"
            );
            return Err(ParameterError::conflict(
                spec.name.clone(),
                format!(
                    "already registered as {} with default {}",
                    existing.spec.param_type,
                    describe_default(existing.spec.default.as_ref())
                ),
            ));
        }

        debug!(
            parameter = %spec.name,
            param_type = %spec.param_type,
            required = spec.is_required(),
            "submission parameter registered"
        );
        let entry = RegistryEntry {
            spec: Arc::new(spec),
            committed: Arc::new(OnceLock::new()),
        };
        let handle = entry.handle();
        self.entries.insert(entry.spec.name.clone(), entry);
        Ok(handle)
    }

    /// Returns a fresh handle for an already registered parameter.
    pub fn handle(&self, name: &str) -> Option<ParameterHandle> {
        self.entries.get(name).map(RegistryEntry::handle)
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.entries.get(name).map(|entry| entry.spec.as_ref())
    }

    /// Iterates the finalized specs in declaration order.
    pub fn specs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.entries.values().map(|entry| entry.spec.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes a validated binding set into the registry so handles in the defining
    /// process observe the bound values.
    ///
    /// Either every slot is written or none is. Committing a value identical to an
    /// existing one is a no-op.
    ///
    /// # Errors
    ///
    /// - [`ParameterError::Unknown`] when the set binds a name this registry never declared.
    /// - [`ParameterError::Missing`] when a declared parameter has no binding.
    /// - [`ParameterError::AlreadyBound`] when a slot already holds a different value.
    pub fn commit(&self, bindings: &BindingSet) -> Result<(), ParameterError> {
        if let Some(foreign) = bindings.iter().find(|binding| !self.entries.contains_key(&binding.name)) {
            return Err(ParameterError::unknown(foreign.name.clone()));
        }

        let missing: Vec<String> = self
            .entries
            .keys()
            .filter(|name| !bindings.contains(name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ParameterError::missing(missing));
        }

        for binding in bindings.iter() {
            if let Some(current) = self.entries[&binding.name].committed.get()
                && current != &binding.value
            {
                return Err(ParameterError::already_bound(binding.name.clone()));
            }
        }

        for binding in bindings.iter() {
            let _ = self.entries[&binding.name].committed.set(binding.value.clone());
        }
        Ok(())
    }
}

fn build_spec(
    name: &str,
    default: Option<ParamValue>,
    declared_type: Option<ParamType>,
    description: Option<String>,
) -> Result<ParameterSpec, ParameterError> {
    if name.trim().is_empty() {
        return Err(ParameterError::conflict(name, "parameter name must not be blank"));
    }

    if let Some(ParamValue::Float(number)) = &default
        && !number.is_finite()
    {
        return Err(ParameterError::conflict(name, "float default must be finite"));
    }

    let param_type = match (declared_type, &default) {
        (Some(declared), Some(value)) if value.param_type() != declared => {
            return Err(ParameterError::conflict(
                name,
                format!("default {value} is {} but the declared type is {declared}", value.param_type()),
            ));
        }
        (Some(declared), _) => declared,
        (None, Some(value)) => value.param_type(),
        (None, None) => ParamType::String,
    };

    Ok(ParameterSpec {
        name: name.to_string(),
        param_type,
        default,
        description,
    })
}

fn describe_default(default: Option<&ParamValue>) -> String {
    default.map_or_else(|| "none".to_string(), |value| format!("{value:?}"))
}
