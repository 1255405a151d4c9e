//! Terminal errors of a submit invocation and their exit codes.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use submit_parsers::{ArraySpecError, CommandError, DirectiveError, JobIdError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SubmitError>;

#[derive(Error, Diagnostic, Debug)]
pub enum SubmitError {
    #[error("mode should be one of slurm, pbs (got `{0}`)")]
    #[diagnostic(
        code(submit::invalid_mode),
        help("pass `-mode slurm|pbs` or set SUBMIT_MODE")
    )]
    InvalidMode(String),

    #[error("missing script name")]
    #[diagnostic(code(submit::missing_script_name), help("use -h for help"))]
    MissingScriptName,

    #[error("script `{name}` not found either in current directory or in script library")]
    #[diagnostic(code(submit::script_not_found), help("script library: {library}"))]
    ScriptNotFound { name: String, library: String },

    #[error("array file `{0}` does not exist")]
    #[diagnostic(code(submit::missing_array_file))]
    MissingArrayFile(Utf8PathBuf),

    #[error("{program} rejected the submission: {message}")]
    #[diagnostic(code(submit::scheduler_submission))]
    SchedulerSubmission { program: String, message: String },

    #[error("invalid array specification")]
    #[diagnostic(code(submit::array_spec))]
    InvalidArraySpec(#[from] ArraySpecError),

    #[error("invalid -o value")]
    #[diagnostic(code(submit::directive))]
    InvalidDirective(#[from] DirectiveError),

    #[error("cannot determine the job id")]
    #[diagnostic(code(submit::job_id))]
    JobId(#[from] JobIdError),

    #[error("failed to run {program}")]
    #[diagnostic(code(submit::spawn))]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on `{path}`")]
    #[diagnostic(code(submit::io))]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    #[diagnostic(code(submit::other))]
    Other(String),
}

impl SubmitError {
    /// Process exit code for this error.
    ///
    /// 1 invalid mode, 2 scheduler submission error, 3 missing array file,
    /// 4 missing script name, 5 script not found, 6 anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidMode(_) => 1,
            Self::SchedulerSubmission { .. } => 2,
            Self::MissingArrayFile(_) => 3,
            Self::MissingScriptName => 4,
            Self::ScriptNotFound { .. } => 5,
            Self::InvalidArraySpec(_)
            | Self::InvalidDirective(_)
            | Self::JobId(_)
            | Self::Spawn { .. }
            | Self::Io { .. }
            | Self::Other(_) => 6,
        }
    }

    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<CommandError> for SubmitError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Execution { command, source } => Self::Spawn {
                program: command,
                source,
            },
            CommandError::Failed {
                command, stderr, ..
            } => Self::SchedulerSubmission {
                program: command,
                message: stderr,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(SubmitError::InvalidMode("lsf".into()).exit_code(), 1);
        assert_eq!(
            SubmitError::SchedulerSubmission {
                program: "sbatch".into(),
                message: "bad".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(SubmitError::MissingArrayFile("names.txt".into()).exit_code(), 3);
        assert_eq!(SubmitError::MissingScriptName.exit_code(), 4);
        assert_eq!(
            SubmitError::ScriptNotFound {
                name: "x.qsub".into(),
                library: String::new()
            }
            .exit_code(),
            5
        );
        assert_eq!(SubmitError::Other("boom".into()).exit_code(), 6);
        assert_eq!(
            SubmitError::from(ArraySpecError::EmptyPath).exit_code(),
            6
        );
    }

    #[test]
    fn test_command_failure_maps_to_submission_error() {
        let err = SubmitError::from(CommandError::Failed {
            command: "qsub".into(),
            code: Some(1),
            stderr: "qsub: Unknown queue".into(),
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "qsub rejected the submission: qsub: Unknown queue"
        );
    }
}
