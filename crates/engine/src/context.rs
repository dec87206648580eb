//! Worker-local execution context.
//!
//! Each worker builds its own [`ExecutionContext`] from the job's startup payload when
//! it starts, then installs it on its thread. Parameter handles and the runtime
//! resolver read from the installed context only; nothing is shared with the process
//! that defined the graph.

use std::{cell::RefCell, marker::PhantomData, rc::Rc, sync::Arc};

use flowparam_types::{ParamValue, StartupPayload};
use indexmap::IndexMap;

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<Arc<ExecutionContext>>> = const { RefCell::new(None) };
}

/// Immutable submission parameter values visible to one worker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionContext {
    job_name: Option<String>,
    region: Option<String>,
    channel: Option<u32>,
    values: IndexMap<String, ParamValue>,
}

impl ExecutionContext {
    /// Builds a context from an already decoded startup payload.
    pub fn from_payload(payload: StartupPayload) -> Self {
        Self {
            job_name: payload.job_name,
            region: None,
            channel: None,
            values: payload.values,
        }
    }

    /// Decodes an encoded startup payload into a fresh context.
    pub fn decode(encoded: &str) -> serde_json::Result<Self> {
        StartupPayload::decode(encoded).map(Self::from_payload)
    }

    /// Tags the context with the worker's region and channel index.
    pub fn with_worker(mut self, region: impl Into<String>, channel: u32) -> Self {
        self.region = Some(region.into());
        self.channel = Some(channel);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job_name.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn channel(&self) -> Option<u32> {
        self.channel
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Installs this context for the current thread until the returned guard drops.
    ///
    /// Installing while another context is active shadows it; the previous context is
    /// restored when the guard drops.
    pub fn install(self) -> ContextGuard {
        let previous = CURRENT_CONTEXT.with(|current| current.borrow_mut().replace(Arc::new(self)));
        ContextGuard {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// Returns the context installed on the current thread, if any.
    pub fn current() -> Option<Arc<ExecutionContext>> {
        CURRENT_CONTEXT.with(|current| current.borrow().clone())
    }

    /// Whether the current thread runs inside a worker.
    pub fn is_installed() -> bool {
        CURRENT_CONTEXT.with(|current| current.borrow().is_some())
    }
}

/// Restores the previously installed context on drop.
///
/// The guard is bound to the thread that created it.
#[must_use = "the context is uninstalled as soon as the guard drops"]
pub struct ContextGuard {
    previous: Option<Arc<ExecutionContext>>,
    _thread_bound: PhantomData<Rc<()>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_CONTEXT.with(|current| *current.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(values: &[(&str, ParamValue)]) -> ExecutionContext {
        ExecutionContext::from_payload(StartupPayload {
            job_name: Some("job".into()),
            values: values.iter().map(|(name, value)| (name.to_string(), value.clone())).collect(),
        })
    }

    #[test]
    fn install_and_restore() {
        assert!(!ExecutionContext::is_installed());
        {
            let _outer = context(&[("w1", ParamValue::Integer(3))]).install();
            assert_eq!(ExecutionContext::current().unwrap().get("w1"), Some(&ParamValue::Integer(3)));
            {
                let _inner = context(&[("w1", ParamValue::Integer(5))]).install();
                assert_eq!(ExecutionContext::current().unwrap().get("w1"), Some(&ParamValue::Integer(5)));
            }
            assert_eq!(ExecutionContext::current().unwrap().get("w1"), Some(&ParamValue::Integer(3)));
        }
        assert!(ExecutionContext::current().is_none());
    }

    #[test]
    fn contexts_are_thread_local() {
        let _guard = context(&[("p1", ParamValue::from("Rolef"))]).install();
        let seen_elsewhere = std::thread::spawn(ExecutionContext::is_installed).join().expect("join");
        assert!(!seen_elsewhere);
        assert!(ExecutionContext::is_installed());
    }

    #[test]
    fn decode_tags_worker_identity() {
        let encoded = r#"{"job_name":"j","values":{"modulo":5}}"#;
        let context = ExecutionContext::decode(encoded).expect("decode").with_worker("parallel-1", 2);
        assert_eq!(context.job_name(), Some("j"));
        assert_eq!(context.region(), Some("parallel-1"));
        assert_eq!(context.channel(), Some(2));
        assert_eq!(context.get("modulo"), Some(&ParamValue::Integer(5)));
    }
}
