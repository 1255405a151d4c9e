//! PBS/Torque backend for submit.
//!
//! Translates a resolved request into a `qsub` invocation.

pub mod qsub;
pub mod types;

pub use qsub::PbsAdapter;
pub use types::{PBS_ARRAY_INDEX_VAR, PBS_JOB_ID_VAR, QSUB, QSUB_JOB_ID_PATTERN};
