//! Submission executor: runs the backend and extracts the job id.

use crate::backend::Backend;
use crate::plan::Plan;
use chrono::Local;
use std::process::Stdio;
use submit_core::{HistoryEntry, Result, append_entry};
use submit_parsers::run_command;
use tokio::process::Command;

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backend accepted the job.
    Submitted { job_id: String },
    /// Dry run: the command that would have been executed.
    DryRun { command: String },
}

/// Runs a [`Plan`] against its backend. Failures are never retried.
pub struct Executor<'a> {
    backend: &'a Backend,
}

impl<'a> Executor<'a> {
    pub fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    pub async fn submit(&self, plan: &Plan) -> Result<Outcome> {
        let request = &plan.resolved.request;
        if request.dry_run {
            return Ok(Outcome::DryRun {
                command: plan.command.to_string(),
            });
        }

        let adapter = self.backend.adapter();
        let mut cmd = Command::new(&plan.command.program);
        cmd.args(&plan.command.args)
            .envs(plan.command.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&request.working_dir)
            .stdin(Stdio::null());

        tracing::debug!("Running command `{}`", plan.command);
        let output = run_command(&mut cmd, adapter.program()).await?;
        if !output.stderr.trim().is_empty() {
            tracing::warn!("{}: {}", adapter.program(), output.stderr.trim());
        }

        let job_id = adapter.job_id_rule().extract(&output.stdout)?;
        tracing::info!("Submitted {} as job {}", request.script_name, job_id);

        if let Some(log_path) = &request.log_path {
            record_history(plan, &job_id, log_path);
        }

        Ok(Outcome::Submitted { job_id })
    }
}

/// Append to the history log; failures only warn.
///
/// The logged command line is the backend invocation itself, so an entry
/// can be rerun as is.
fn record_history(plan: &Plan, job_id: &str, log_path: &camino::Utf8Path) {
    let request = &plan.resolved.request;
    let entry = HistoryEntry {
        timestamp: Local::now(),
        job_id: job_id.to_string(),
        user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
        script_name: request.script_base_name().to_string(),
        working_dir: request.working_dir.to_string(),
        command_line: plan.command.to_string(),
    };
    if let Err(e) = append_entry(log_path, &entry) {
        tracing::warn!("log file `{}` does not exist or is not writable: {}", log_path, e);
    }
}
