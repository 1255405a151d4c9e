//! Submission pipeline for submit.
//!
//! Dispatches to the SLURM or PBS adapter, stages the instrumented script
//! and runs the backend binary.

pub mod backend;
pub mod executor;
pub mod plan;

pub use backend::{Backend, BackendOverrides};
pub use executor::{Executor, Outcome};
pub use plan::{Plan, StagedScript, plan};
