//! submit - run one qsub script on SLURM or PBS.

use clap::Parser;
use std::process::ExitCode;
use submit_cli::{Action, Args, Environment, normalize, normalize_argv};
use submit_core::{
    Result, ScriptLibrary, SubmissionRequest, SubmitError, render_view, resolve,
};
use submit_engine::{Backend, BackendOverrides, Executor, Outcome, Plan, plan};
use tracing_subscriber::EnvFilter;

/// Exit code for command line usage errors.
const USAGE_EXIT_CODE: u8 = 6;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse_from(normalize_argv(std::env::args())) {
        Ok(args) => args,
        Err(err) => {
            // --help and --version also arrive here
            let code = if err.use_stderr() { USAGE_EXIT_CODE } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

/// Log to stderr; stdout carries the job id.
fn init_tracing(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let debug = args.debug;
    let env = Environment::capture()?;

    match normalize(args, &env)? {
        Action::List { library, patterns } => {
            list(&library, &patterns);
            Ok(())
        }
        Action::View { name, path, level } => {
            print!("{}", render_view(&name, &path, level)?);
            Ok(())
        }
        Action::Submit(request) => submit(*request, debug).await,
    }
}

fn list(library: &ScriptLibrary, patterns: &[String]) {
    if library.dirs().is_empty() {
        tracing::warn!("No script library found; set SUBMIT_LIB or pass -lib");
        return;
    }
    for listing in library.list(patterns) {
        println!("{}:", listing.dir);
        for script in &listing.scripts {
            println!("  {script}");
        }
    }
}

async fn submit(request: SubmissionRequest, debug: u8) -> Result<()> {
    let mode = request.mode;
    let resolved = resolve(request)?;
    let backend = Backend::with_overrides(mode, &BackendOverrides::from_env(mode))?;
    let plan = plan(resolved, &backend)?;

    if debug >= 2 {
        dump(&plan)?;
    }

    match Executor::new(&backend).submit(&plan).await? {
        Outcome::Submitted { job_id } => println!("{job_id}"),
        Outcome::DryRun { command } => println!("{command}"),
    }
    Ok(())
}

/// `-dd`: show the normalized request and the script as it will be submitted.
fn dump(plan: &Plan) -> Result<()> {
    let json = serde_json::to_string_pretty(&plan.resolved.request)
        .map_err(|e| SubmitError::Other(format!("cannot serialize request: {e}")))?;
    eprintln!("{json}");
    eprintln!("--- {} ---", plan.staged.path());
    eprint!("{}", plan.script.body);
    Ok(())
}
