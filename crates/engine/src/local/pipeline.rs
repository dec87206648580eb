//! Graph builder for the local runtime.

use std::{fmt, sync::Arc};

use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;

use super::operator::{FilterOperator, MapOperator, OperatorFactory, operator_factory};
use crate::structural::{OperatorParam, ParallelWidth};

/// A linear graph: a finite source followed by operator stages, some of which sit in
/// parallel regions.
///
/// ```ignore
/// let pipeline = Pipeline::source(0..67)
///     .set_parallel(&w1)
///     .filter(move |tuple| Ok(tuple.as_i64().unwrap_or(1) % 3 == 0))
///     .end_parallel();
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub(crate) source: Vec<Value>,
    pub(crate) segments: Vec<Segment>,
}

/// A run of stages executed either by a single worker or by one worker per channel.
#[derive(Debug, Clone, Default)]
pub(crate) struct Segment {
    pub(crate) width: Option<ParallelWidth>,
    pub(crate) stages: Vec<Stage>,
}

#[derive(Clone)]
pub(crate) struct Stage {
    pub(crate) name: String,
    pub(crate) params: IndexMap<String, OperatorParam>,
    pub(crate) factory: OperatorFactory,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn source<I>(tuples: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            source: tuples.into_iter().map(Into::into).collect(),
            segments: vec![Segment::default()],
        }
    }

    /// Keeps the tuples for which `predicate` returns `true`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<bool> + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        let name = format!("filter-{}", self.stage_count());
        self.push(name, IndexMap::new(), operator_factory(move |_| FilterOperator::new(Arc::clone(&predicate))))
    }

    /// Replaces each tuple with the result of `transform`.
    pub fn map<F>(self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let transform = Arc::new(transform);
        let name = format!("map-{}", self.stage_count());
        self.push(name, IndexMap::new(), operator_factory(move |_| MapOperator::new(Arc::clone(&transform))))
    }

    /// Adds an operator whose declared parameters may be bound to submission parameters.
    ///
    /// Parameter values are resolved before any worker starts and handed to `factory`
    /// once per operator instance.
    pub fn operator(
        self,
        name: impl Into<String>,
        params: IndexMap<String, OperatorParam>,
        factory: OperatorFactory,
    ) -> Self {
        self.push(name.into(), params, factory)
    }

    /// Opens a parallel region; stages added until [`end_parallel`](Self::end_parallel)
    /// run once per channel. A region left open extends to the end of the graph.
    pub fn set_parallel(mut self, width: impl Into<ParallelWidth>) -> Self {
        self.segments.push(Segment {
            width: Some(width.into()),
            stages: Vec::new(),
        });
        self
    }

    pub fn end_parallel(mut self) -> Self {
        self.segments.push(Segment::default());
        self
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    /// Number of parallel regions in the graph.
    pub fn parallel_regions(&self) -> usize {
        self.segments.iter().filter(|segment| segment.width.is_some()).count()
    }

    fn stage_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.stages.len()).sum()
    }

    fn push(mut self, name: String, params: IndexMap<String, OperatorParam>, factory: OperatorFactory) -> Self {
        if let Some(segment) = self.segments.last_mut() {
            segment.stages.push(Stage { name, params, factory });
        }
        self
    }
}
