//! `sbatch` command construction.

use crate::types::{
    ARRAY_TOKEN, JOB_TOKEN, SBATCH, SBATCH_JOB_ID_PATTERN, SLURM_ARRAY_TASK_VAR, SLURM_JOB_ID_VAR,
};
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
    Lazy::new(|| Regex::new(SBATCH_JOB_ID_PATTERN).expect("valid sbatch job id pattern"));

/// SLURM variant of [`BackendAdapter`].
#[derive(Debug, Clone)]
pub struct SlurmAdapter {
    program: String,
    job_id_rule: JobIdRule,
}

impl Default for SlurmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlurmAdapter {
    pub fn new() -> Self {
        Self {
            program: SBATCH.to_string(),
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
}

impl BackendAdapter for SlurmAdapter {
    fn mode(&self) -> Mode {
        Mode::Slurm
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn job_id_var(&self) -> &'static str {
        SLURM_JOB_ID_VAR
    }

    fn dependency_directive(&self, job_ids: &[String]) -> Vec<String> {
        if job_ids.is_empty() {
            return Vec::new();
        }
        vec![format!("--dependency=afterok:{}", job_ids.join(":"))]
    }

    fn array_directive(&self, array: &ResolvedArray) -> Vec<String> {
        vec![format!("--array={}", array.range().render())]
    }

    fn argument_binding(&self) -> ArgumentBinding {
        ArgumentBinding::Native
    }

    fn file_array_binding(&self) -> FileArrayBinding {
        FileArrayBinding::Injected {
            index_var: SLURM_ARRAY_TASK_VAR,
        }
    }

    fn output_paths(
        &self,
        script_base: &str,
        suffix: Option<&str>,
        dir: &Utf8Path,
        array: bool,
    ) -> OutputPaths {
        let stem = format!("{}{}", output_prefix(dir), output_stem(script_base, suffix));
        let token = if array { ARRAY_TOKEN } else { JOB_TOKEN };
        OutputPaths {
            job_name: script_base.to_string(),
            stdout: format!("{stem}.o{token}"),
            stderr: format!("{stem}.e{token}"),
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
        cmd.args(["--parsable", "-D", request.working_dir.as_str()])
            .args(["-J", outputs.job_name.as_str()])
            .args(["-o", outputs.stdout.as_str(), "-e", outputs.stderr.as_str()]);

        if let Some(array) = &resolved.array {
            cmd.args(self.array_directive(array));
        }
        if let Some(comment) = &request.comment {
            cmd.arg(format!("--comment={comment}"));
        }
        cmd.args(self.dependency_directive(&resolved.dependencies));
        if let Some(queue) = &request.queue {
            cmd.arg(format!("--account={queue}"));
        }
        if request.wait {
            cmd.arg("--wait");
        }
        for directive in request.config_options.iter().chain(&request.extra_options) {
            cmd.args(directive.split_whitespace());
        }

        cmd.arg(script.as_str());
        cmd.args(request.script_args.iter().cloned());

        tracing::debug!("Built sbatch command: {}", cmd);
        cmd
    }
}
