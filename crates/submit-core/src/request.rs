//! The normalized submission request.

use crate::error::{Result, SubmitError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Scheduler syntax to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Slurm,
    Pbs,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Slurm, Mode::Pbs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Slurm => "slurm",
            Mode::Pbs => "pbs",
        }
    }

    /// Pick the mode from the `-mode` flag, falling back to `SUBMIT_MODE`.
    ///
    /// An absent or unknown value is an [`SubmitError::InvalidMode`].
    pub fn resolve(flag: Option<&str>, env: Option<&str>) -> Result<Mode> {
        match flag.or(env).map(str::trim).filter(|m| !m.is_empty()) {
            Some(value) => value.parse(),
            None => Err(SubmitError::InvalidMode(String::new())),
        }
    }

    /// Options file name (relative to the home directory) used when `-conf`
    /// is not given.
    pub fn default_config_name(&self) -> &'static str {
        match self {
            Mode::Slurm => ".sbatchrc",
            Mode::Pbs => ".qsubrc",
        }
    }
}

impl FromStr for Mode {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "slurm" => Ok(Mode::Slurm),
            "pbs" => Ok(Mode::Pbs),
            other => Err(SubmitError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job array as requested on the command line, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayRequest {
    /// `-t LOW-HIGH[%N]`
    Range(String),
    /// `-T PATH[%N]`, or `-A PATH[%N]` when `split_args` is set.
    File { spec: String, split_args: bool },
}

/// Everything one invocation submits, built once by the normalizer.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRequest {
    pub mode: Mode,
    /// Script name as typed by the user.
    pub script_name: String,
    /// Resolved absolute path of the script.
    pub script_path: Utf8PathBuf,
    /// Positional arguments bound to `$arg1..$argN`.
    pub script_args: Vec<String>,
    /// Done file pattern; `@` is replaced by the job id when the job ends.
    pub done_file_pattern: Option<String>,
    pub after_job_ids: Vec<String>,
    pub array: Option<ArrayRequest>,
    /// Directives from `-o`, in encounter order.
    pub extra_options: Vec<String>,
    /// Directives from the options file not overridden by `extra_options`.
    pub config_options: Vec<String>,
    pub comment: Option<String>,
    pub queue: Option<String>,
    pub no_modify: bool,
    pub wait: bool,
    pub dry_run: bool,
    pub log_path: Option<Utf8PathBuf>,
    /// Directory receiving the job's stdout/stderr files.
    pub output_dir: Option<Utf8PathBuf>,
    /// Directory the job is submitted from and runs in.
    pub working_dir: Utf8PathBuf,
}

impl SubmissionRequest {
    /// Create a request with only the required fields set.
    pub fn new(mode: Mode, script_name: impl Into<String>, script_path: Utf8PathBuf) -> Self {
        let working_dir = script_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        Self {
            mode,
            script_name: script_name.into(),
            script_path,
            script_args: Vec::new(),
            done_file_pattern: None,
            after_job_ids: Vec::new(),
            array: None,
            extra_options: Vec::new(),
            config_options: Vec::new(),
            comment: None,
            queue: None,
            no_modify: false,
            wait: false,
            dry_run: false,
            log_path: None,
            output_dir: None,
            working_dir,
        }
    }

    /// File name of the script, used for the job name and output files.
    pub fn script_base_name(&self) -> &str {
        self.script_path.file_name().unwrap_or(&self.script_name)
    }

    /// Instance suffix for output files: the file name of the first script
    /// argument, when there is one.
    pub fn instance_suffix(&self) -> Option<&str> {
        self.script_args
            .first()
            .map(|arg| Utf8Path::new(arg).file_name().unwrap_or(arg))
            .filter(|s| !s.is_empty())
    }

    /// The command line as the user would retype it.
    pub fn command_line(&self) -> String {
        std::iter::once(self.script_name.as_str())
            .chain(self.script_args.iter().map(String::as_str))
            .map(submit_parsers::shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
