//! In-process runtime for running submitted graphs.
//!
//! The runtime exists so parameter semantics can be exercised end to end: parallel
//! regions sized by submission parameters, operators configured from them, and worker
//! code resolving values from its own execution context.

mod operator;
mod pipeline;
mod runtime;

pub use operator::{Operator, OperatorFactory, operator_factory};
pub use pipeline::Pipeline;
pub use runtime::{LocalRuntime, RegionReport, RunReport, RuntimeError};
