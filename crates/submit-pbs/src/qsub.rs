//! `qsub` command construction.
//!
//! qsub does not forward positional arguments to the script, so script
//! arguments are written into the prologue by the instrumenter. When the
//! script is submitted unmodified they are exported through `-v` instead.

use crate::types::{PBS_ARRAY_INDEX_VAR, PBS_JOB_ID_VAR, QSUB, QSUB_JOB_ID_PATTERN};
use camino::Utf8Path;
use once_cell::sync::Lazy;
use regex::Regex;
use submit_core::backend::{output_prefix, output_stem};
use submit_core::{
    ArgumentBinding, BackendAdapter, BackendCommand, FileArrayBinding, Mode, OutputPaths,
    ResolvedArray, ResolvedRequest,
};
use submit_parsers::JobIdRule;

static DEFAULT_JOB_ID_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(QSUB_JOB_ID_PATTERN).expect("valid qsub job id pattern"));

/// PBS variant of [`BackendAdapter`].
#[derive(Debug, Clone)]
pub struct PbsAdapter {
    program: String,
    job_id_rule: JobIdRule,
}

impl Default for PbsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PbsAdapter {
    pub fn new() -> Self {
        Self {
            program: QSUB.to_string(),
            job_id_rule: JobIdRule::from_regex(DEFAULT_JOB_ID_RULE.clone()),
        }
    }

    /// Use another submission binary (site wrapper, test double).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_job_id_rule(mut self, rule: JobIdRule) -> Self {
        self.job_id_rule = rule;
        self
    }

    /// Export script arguments as `args`, `arg1..argN` through `-v`.
    fn export_arguments(&self, cmd: &mut BackendCommand, args: &[String]) {
        if args.is_empty() {
            return;
        }
        let mut names = vec!["args".to_string()];
        cmd.env("args", args.join(" "));
        for (i, arg) in args.iter().enumerate() {
            let name = format!("arg{}", i + 1);
            cmd.env(name.as_str(), arg.as_str());
            names.push(name);
        }
        cmd.args(["-v".to_string(), names.join(",")]);
    }
}

impl BackendAdapter for PbsAdapter {
    fn mode(&self) -> Mode {
        Mode::Pbs
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn job_id_var(&self) -> &'static str {
        PBS_JOB_ID_VAR
    }

    fn dependency_directive(&self, job_ids: &[String]) -> Vec<String> {
        if job_ids.is_empty() {
            return Vec::new();
        }
        vec!["-W".to_string(), format!("depend=afterok:{}", job_ids.join(":"))]
    }

    fn array_directive(&self, array: &ResolvedArray) -> Vec<String> {
        vec!["-t".to_string(), array.range().render()]
    }

    fn argument_binding(&self) -> ArgumentBinding {
        ArgumentBinding::Injected
    }

    fn file_array_binding(&self) -> FileArrayBinding {
        FileArrayBinding::Injected {
            index_var: PBS_ARRAY_INDEX_VAR,
        }
    }

    /// PBS names output files `<job name>.o<job number>` by itself, so the
    /// stem goes into the job name and `-o`/`-e` only select the directory.
    fn output_paths(
        &self,
        script_base: &str,
        suffix: Option<&str>,
        dir: &Utf8Path,
        _array: bool,
    ) -> OutputPaths {
        let prefix = output_prefix(dir);
        OutputPaths {
            job_name: output_stem(script_base, suffix),
            stdout: prefix.clone(),
            stderr: prefix,
        }
    }

    fn job_id_rule(&self) -> &JobIdRule {
        &self.job_id_rule
    }

    fn build_command(&self, resolved: &ResolvedRequest, script: &Utf8Path) -> BackendCommand {
        let request = &resolved.request;
        let dir = request.output_dir.as_deref().unwrap_or(Utf8Path::new(""));
        let outputs = self.output_paths(
            request.script_base_name(),
            request.instance_suffix(),
            dir,
            resolved.array.is_some(),
        );

        let mut cmd = BackendCommand::new(&self.program);
        cmd.args(["-d", request.working_dir.as_str()])
            .args(["-N", outputs.job_name.as_str()]);
        if !outputs.stdout.is_empty() {
            cmd.args(["-o", outputs.stdout.as_str(), "-e", outputs.stderr.as_str()]);
        }

        if let Some(array) = &resolved.array {
            cmd.args(self.array_directive(array));
        }
        if request.comment.is_some() {
            tracing::warn!("qsub has no job comment option; ignoring -p");
        }
        cmd.args(self.dependency_directive(&resolved.dependencies));
        if let Some(queue) = &request.queue {
            cmd.args(["-q", queue.as_str()]);
        }
        if request.wait {
            cmd.args(["-W", "block=true"]);
        }
        if request.no_modify {
            self.export_arguments(&mut cmd, &request.script_args);
        }
        for directive in request.config_options.iter().chain(&request.extra_options) {
            cmd.args(directive.split_whitespace());
        }

        cmd.arg(script.as_str());

        tracing::debug!("Built qsub command: {}", cmd);
        cmd
    }
}
