//! SLURM names and output formats.

/// Submission binary.
pub const SBATCH: &str = "sbatch";

/// Job id inside a running job (unique per array task).
pub const SLURM_JOB_ID_VAR: &str = "SLURM_JOB_ID";

/// Array task index inside a running array task.
pub const SLURM_ARRAY_TASK_VAR: &str = "SLURM_ARRAY_TASK_ID";

/// `sbatch --parsable` prints `jobid` or `jobid;cluster`; without
/// `--parsable` it prints `Submitted batch job <jobid>`.
pub const SBATCH_JOB_ID_PATTERN: &str = r"(?m)^\s*(?:Submitted batch job\s+)?(\d+)";

/// Output file tokens: `%j` job id, `%A`/`%a` array master id and task index.
pub const JOB_TOKEN: &str = "%j";
pub const ARRAY_TOKEN: &str = "%A_%a";
