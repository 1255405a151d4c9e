//! Backend capability interface.
//!
//! Each scheduler crate implements [`BackendAdapter`] for its own directive
//! grammar. The instrumenter and the engine only talk to this trait.

use crate::request::Mode;
use crate::resolve::{ResolvedArray, ResolvedRequest};
use camino::Utf8Path;
use serde::Serialize;
use std::fmt;
use submit_parsers::{JobIdRule, shell_quote};

/// How script arguments reach `$arg1..$argN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentBinding {
    /// The backend passes trailing arguments to the script as `$1..$N`.
    Native,
    /// The backend has no positional arguments; the instrumenter writes
    /// explicit `argN=...` assignments into the prologue.
    Injected,
}

/// How `JOB_FILEARRAY_LINE` is made available to file-driven array tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileArrayBinding {
    /// The backend sets the variable itself.
    Native,
    /// The prologue looks the line up, using `index_var` as the line number.
    Injected { index_var: &'static str },
}

/// Where the job's stdout and stderr go.
///
/// Job numbers are filled in by the backend through its own template
/// tokens, never by this tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub job_name: String,
    pub stdout: String,
    pub stderr: String,
}

/// Final invocation of the backend binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Environment variables added to the backend process.
    pub env: Vec<(String, String)>,
}

impl BackendCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for BackendCommand {
    /// Shell-quoted rendering, with environment additions as a prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        words.push(shell_quote(&self.program));
        words.extend(self.args.iter().map(|a| shell_quote(a)));
        f.write_str(&words.join(" "))
    }
}

/// Capability set of one scheduler backend.
pub trait BackendAdapter {
    fn mode(&self) -> Mode;

    /// Submission binary (`sbatch`, `qsub`, or a site override).
    fn program(&self) -> &str;

    /// Environment variable holding the job id inside a running job.
    fn job_id_var(&self) -> &'static str;

    /// Arguments making the job wait for every id in `job_ids` to finish
    /// successfully. Empty when there are no dependencies.
    fn dependency_directive(&self, job_ids: &[String]) -> Vec<String>;

    /// Arguments declaring the job array.
    fn array_directive(&self, array: &ResolvedArray) -> Vec<String>;

    fn argument_binding(&self) -> ArgumentBinding;

    fn file_array_binding(&self) -> FileArrayBinding;

    /// Output naming: `<base>.<suffix>.o<jobNumber>` / `.e<jobNumber>`.
    fn output_paths(
        &self,
        script_base: &str,
        suffix: Option<&str>,
        dir: &Utf8Path,
        array: bool,
    ) -> OutputPaths;

    /// Rule extracting the job id from the submission output.
    fn job_id_rule(&self) -> &JobIdRule;

    /// Assemble the full command submitting `script` for `request`.
    fn build_command(&self, request: &ResolvedRequest, script: &Utf8Path) -> BackendCommand;
}

/// `<base>` or `<base>.<suffix>`.
pub fn output_stem(script_base: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{script_base}.{suffix}"),
        None => script_base.to_string(),
    }
}

/// Output directory prefix: `dir/`, or nothing for the current directory.
pub fn output_prefix(dir: &Utf8Path) -> String {
    if dir.as_str().is_empty() || dir == "." {
        String::new()
    } else {
        format!("{}/", dir.as_str().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_command_display() {
        let mut cmd = BackendCommand::new("qsub");
        cmd.args(["-N", "job one"]).arg("/tmp/x.sh").env("arg1", "a b");
        assert_eq!(cmd.to_string(), "arg1='a b' qsub -N 'job one' /tmp/x.sh");
    }

    #[test]
    fn test_output_stem_and_prefix() {
        assert_eq!(output_stem("align.qsub", Some("S1.fq")), "align.qsub.S1.fq");
        assert_eq!(output_stem("align.qsub", None), "align.qsub");
        assert_eq!(output_prefix(Utf8Path::new("log")), "log/");
        assert_eq!(output_prefix(Utf8Path::new("log/")), "log/");
        assert_eq!(output_prefix(Utf8Path::new("")), "");
        assert_eq!(output_prefix(Utf8Path::new(".")), "");
    }
}
