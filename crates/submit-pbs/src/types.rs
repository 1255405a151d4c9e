//! PBS names and output formats.

/// Submission binary.
pub const QSUB: &str = "qsub";

/// Job id inside a running job.
pub const PBS_JOB_ID_VAR: &str = "PBS_JOBID";

/// Array task index inside a running array task (Torque).
pub const PBS_ARRAY_INDEX_VAR: &str = "PBS_ARRAYID";

/// qsub prints the full job id on the first line: `1234.server`, or
/// `1234[].server` for arrays.
pub const QSUB_JOB_ID_PATTERN: &str = r"(?m)^\s*(\d+(?:\[\])?(?:\.\S+)?)\s*$";
