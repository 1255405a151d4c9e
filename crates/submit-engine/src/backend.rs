//! Closed set of supported backends.

use submit_core::{BackendAdapter, Mode, Result};
use submit_parsers::{JobIdRule, non_empty_string};
use submit_pbs::PbsAdapter;
use submit_slurm::SlurmAdapter;

/// Environment variable overriding the sbatch binary.
pub const SBATCH_ENV: &str = "SUBMIT_SBATCH";
/// Environment variable overriding the qsub binary.
pub const QSUB_ENV: &str = "SUBMIT_QSUB";
/// Environment variable overriding the job id extraction regex.
pub const JOB_ID_PATTERN_ENV: &str = "SUBMIT_JOBID_PATTERN";

/// Site-specific replacements for backend defaults.
#[derive(Debug, Clone, Default)]
pub struct BackendOverrides {
    pub program: Option<String>,
    pub job_id_pattern: Option<String>,
}

impl BackendOverrides {
    /// Read overrides for `mode` from the environment.
    pub fn from_env(mode: Mode) -> Self {
        let program_var = match mode {
            Mode::Slurm => SBATCH_ENV,
            Mode::Pbs => QSUB_ENV,
        };
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .and_then(|v| non_empty_string(&v))
        };
        Self {
            program: read(program_var),
            job_id_pattern: read(JOB_ID_PATTERN_ENV),
        }
    }
}

/// Apply `BackendOverrides` to an adapter's `with_program` /
/// `with_job_id_rule` builders.
macro_rules! apply_overrides {
    ($adapter:expr, $overrides:expr, $rule:expr) => {{
        let mut adapter = $adapter;
        if let Some(program) = &$overrides.program {
            adapter = adapter.with_program(program);
        }
        if let Some(rule) = $rule {
            adapter = adapter.with_job_id_rule(rule);
        }
        adapter
    }};
}

/// The scheduler backend an invocation targets.
#[derive(Debug, Clone)]
pub enum Backend {
    Slurm(SlurmAdapter),
    Pbs(PbsAdapter),
}

impl Backend {
    pub fn new(mode: Mode) -> Self {
        match mode {
            Mode::Slurm => Backend::Slurm(SlurmAdapter::new()),
            Mode::Pbs => Backend::Pbs(PbsAdapter::new()),
        }
    }

    /// Build the backend for `mode`, applying `overrides`.
    pub fn with_overrides(mode: Mode, overrides: &BackendOverrides) -> Result<Self> {
        let rule = overrides
            .job_id_pattern
            .as_deref()
            .map(JobIdRule::new)
            .transpose()?;

        let backend = match mode {
            Mode::Slurm => Backend::Slurm(apply_overrides!(SlurmAdapter::new(), overrides, rule)),
            Mode::Pbs => Backend::Pbs(apply_overrides!(PbsAdapter::new(), overrides, rule)),
        };
        Ok(backend)
    }

    pub fn adapter(&self) -> &dyn BackendAdapter {
        match self {
            Backend::Slurm(adapter) => adapter,
            Backend::Pbs(adapter) => adapter,
        }
    }

    pub fn mode(&self) -> Mode {
        self.adapter().mode()
    }
}
