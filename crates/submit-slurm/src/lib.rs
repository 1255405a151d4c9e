//! SLURM backend for submit.
//!
//! Translates a resolved request into an `sbatch` invocation.

pub mod sbatch;
pub mod types;

pub use sbatch::SlurmAdapter;
pub use types::{SBATCH, SBATCH_JOB_ID_PATTERN, SLURM_ARRAY_TASK_VAR, SLURM_JOB_ID_VAR};
