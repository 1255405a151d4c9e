//! CLI argument parsing for submit.
//!
//! The command line keeps the single-dash long flags of the original tool
//! (`-mode slurm`, `-after 42`, `-ls`). [`normalize_argv`] rewrites those to
//! the `--long` form before clap sees them, and marks the script name so
//! everything after it reaches the script untouched.

pub mod normalize;

pub use normalize::{Action, Environment, load_config, normalize};

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Default)]
#[command(name = "submit", version)]
#[command(about = "Submit a qsub script to SLURM or PBS")]
pub struct Args {
    /// Scheduler syntax: slurm or pbs (default: $SUBMIT_MODE)
    #[arg(long)]
    pub mode: Option<String>,

    /// Options file, relative to the home directory
    /// (default: ~/.sbatchrc or ~/.qsubrc)
    #[arg(long)]
    pub conf: Option<Utf8PathBuf>,

    /// Colon-separated script library path (default: $SUBMIT_LIB)
    #[arg(long)]
    pub lib: Option<String>,

    /// Create this file when the job ends; `@` is replaced by the job id
    #[arg(long)]
    pub done: Option<String>,

    /// Run only after job ID completes successfully (repeatable)
    #[arg(long, value_name = "ID")]
    pub after: Vec<String>,

    /// Job array LOW-HIGH[%N]
    #[arg(short = 't', value_name = "RANGE", conflicts_with_all = ["file_array", "args_array"])]
    pub array: Option<String>,

    /// Job array over the lines of FILE[%N]; the line is in $JOB_FILEARRAY_LINE
    #[arg(short = 'T', value_name = "FILE", conflicts_with = "args_array")]
    pub file_array: Option<String>,

    /// Like -T, with the line split on tabs into $JOB_FILEARRAY_ARGS
    #[arg(short = 'A', value_name = "FILE")]
    pub args_array: Option<String>,

    /// Scheduler directives, comma separated (repeatable)
    #[arg(short = 'o', value_name = "DIRECTIVES")]
    pub option: Vec<String>,

    /// Job comment
    #[arg(short = 'p', value_name = "COMMENT")]
    pub comment: Option<String>,

    /// Queue (slurm account)
    #[arg(short = 'q', value_name = "QUEUE")]
    pub queue: Option<String>,

    /// Directory for the job's output files (default: ./log if it exists)
    #[arg(short = 'l', value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Append a line to this history log (default: $SUBMIT_LOG)
    #[arg(long)]
    pub log: Option<Utf8PathBuf>,

    /// Submit the script unmodified
    #[arg(short = 'n')]
    pub no_modify: bool,

    /// Dry run: print the scheduler command instead of running it
    #[arg(short = 'x')]
    pub dry_run: bool,

    /// Wait for the job to finish
    #[arg(short = 'W')]
    pub wait: bool,

    /// Debug output; -dd also dumps the request and script and implies -x
    #[arg(short = 'd', action = ArgAction::Count)]
    pub debug: u8,

    /// Show script documentation (-v, -vv, or -vvv for the whole script)
    #[arg(short = 'v', action = ArgAction::Count)]
    pub view: u8,

    /// List library scripts, optionally filtered by patterns
    #[arg(long)]
    pub ls: bool,

    /// Script name followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Args {
    pub fn script(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    pub fn script_args(&self) -> &[String] {
        self.command.get(1..).unwrap_or(&[])
    }
}

/// Single-dash long flags taking a value.
const LONG_VALUE_FLAGS: &[&str] = &["mode", "conf", "lib", "done", "after", "log"];
/// Single-dash long switches.
const LONG_SWITCHES: &[&str] = &["ls"];
/// Short flags taking a value in the next token.
const SHORT_VALUE_FLAGS: &[char] = &['t', 'T', 'A', 'o', 'p', 'q', 'l'];

/// Rewrite a raw argv into the form [`Args`] parses.
///
/// `-mode x` and `-mode=x` become `--mode=x`, `-ls` becomes `--ls`, and a
/// `--` is inserted before the first positional so the script's own
/// arguments are never taken as submit flags.
pub fn normalize_argv<I, S>(argv: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut input = argv.into_iter().map(Into::into);
    let mut out: Vec<String> = input.next().into_iter().collect();

    while let Some(token) = input.next() {
        if token == "--" {
            out.push(token);
            out.extend(input);
            return out;
        }

        if let Some(flag) = token.strip_prefix("--") {
            let takes_value = !flag.contains('=') && LONG_VALUE_FLAGS.contains(&flag);
            out.push(token.clone());
            if takes_value {
                out.extend(input.next());
            }
            continue;
        }

        if let Some(flag) = token.strip_prefix('-').filter(|f| !f.is_empty()) {
            let (name, inline) = match flag.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (flag, None),
            };
            if LONG_VALUE_FLAGS.contains(&name) {
                match inline {
                    Some(value) => out.push(format!("--{name}={value}")),
                    None => match input.next() {
                        Some(value) => out.push(format!("--{name}={value}")),
                        None => out.push(format!("--{name}")),
                    },
                }
                continue;
            }
            if LONG_SWITCHES.contains(&flag) {
                out.push(format!("--{flag}"));
                continue;
            }
            let mut chars = flag.chars();
            let short = match (chars.next(), chars.next()) {
                (Some(c), None) if SHORT_VALUE_FLAGS.contains(&c) => Some(c),
                _ => None,
            };
            // Attach the value so clap never mistakes `-o --mem=1G` for a flag.
            match short.and_then(|c| input.next().map(|value| (c, value))) {
                Some((c, value)) => out.push(format!("-{c}={value}")),
                None => out.push(token.clone()),
            }
            continue;
        }

        out.push("--".to_string());
        out.push(token);
        out.extend(input);
        return out;
    }
    out
}
