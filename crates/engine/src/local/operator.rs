//! Operator abstraction for the local runtime.

use std::sync::Arc;

use anyhow::Result;
use flowparam_types::ParamValue;
use indexmap::IndexMap;
use serde_json::Value;

/// One instance of a graph operator running inside a worker.
///
/// Every worker channel creates its own instances. `open` runs once after the worker's
/// execution context is installed, which makes it the place to acquire parameter scopes
/// that the per-tuple `process` calls then reuse.
pub trait Operator: Send {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Processes one tuple, returning zero or more output tuples.
    fn process(&mut self, tuple: Value) -> Result<Vec<Value>>;

    fn close(&mut self) {}
}

/// Builds an operator instance from its resolved operator parameters.
pub type OperatorFactory = Arc<dyn Fn(&IndexMap<String, ParamValue>) -> Box<dyn Operator> + Send + Sync>;

/// Wraps a factory closure so call sites avoid spelling out the trait object.
pub fn operator_factory<F, O>(factory: F) -> OperatorFactory
where
    F: Fn(&IndexMap<String, ParamValue>) -> O + Send + Sync + 'static,
    O: Operator + 'static,
{
    Arc::new(move |params: &IndexMap<String, ParamValue>| Box::new(factory(params)) as Box<dyn Operator>)
}

pub(crate) struct FilterOperator<F> {
    predicate: Arc<F>,
}

impl<F> FilterOperator<F> {
    pub(crate) fn new(predicate: Arc<F>) -> Self {
        Self { predicate }
    }
}

impl<F> Operator for FilterOperator<F>
where
    F: Fn(&Value) -> Result<bool> + Send + Sync,
{
    fn process(&mut self, tuple: Value) -> Result<Vec<Value>> {
        if (self.predicate)(&tuple)? { Ok(vec![tuple]) } else { Ok(Vec::new()) }
    }
}

pub(crate) struct MapOperator<F> {
    transform: Arc<F>,
}

impl<F> MapOperator<F> {
    pub(crate) fn new(transform: Arc<F>) -> Self {
        Self { transform }
    }
}

impl<F> Operator for MapOperator<F>
where
    F: Fn(Value) -> Result<Value> + Send + Sync,
{
    fn process(&mut self, tuple: Value) -> Result<Vec<Value>> {
        Ok(vec![(self.transform)(tuple)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_keeps_matching_tuples() {
        let mut filter = FilterOperator::new(Arc::new(|tuple: &Value| Ok(tuple.as_i64().unwrap_or_default() % 2 == 0)));
        assert_eq!(filter.process(json!(4)).unwrap(), vec![json!(4)]);
        assert!(filter.process(json!(5)).unwrap().is_empty());
    }

    #[test]
    fn map_transforms_each_tuple() {
        let mut map = MapOperator::new(Arc::new(|tuple: Value| Ok(json!(format!("{tuple}-x")))));
        assert_eq!(map.process(json!(1)).unwrap(), vec![json!("1-x")]);
    }

    #[test]
    fn factory_receives_operator_params() {
        struct Suffix(String);
        impl Operator for Suffix {
            fn process(&mut self, tuple: Value) -> Result<Vec<Value>> {
                Ok(vec![json!(format!("{}{}", tuple.as_str().unwrap_or_default(), self.0))])
            }
        }

        let factory = operator_factory(|params| Suffix(params["suffix"].to_string()));
        let mut params = IndexMap::new();
        params.insert("suffix".to_string(), ParamValue::from("!"));

        let mut operator = factory(&params);
        assert_eq!(operator.process(json!("hi")).unwrap(), vec![json!("hi!")]);
    }
}
