//! Request normalizer: turns parsed arguments, the options file and the
//! environment into one [`SubmissionRequest`].

use crate::Args;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use submit_core::{ArrayRequest, Mode, Result, ScriptLibrary, SubmissionRequest, SubmitError};
use submit_parsers::{merge_directives, non_empty_string, parse_config_lines, split_directives};

/// Process environment the normalizer reads, captured once.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// `SUBMIT_MODE`
    pub mode: Option<String>,
    /// `SUBMIT_LIB`
    pub lib: Option<String>,
    /// `SUBMIT_LOG`
    pub log: Option<Utf8PathBuf>,
    pub home: Option<Utf8PathBuf>,
    pub cwd: Utf8PathBuf,
    /// Library used when neither `-lib` nor `SUBMIT_LIB` is given.
    pub default_lib: Option<Utf8PathBuf>,
}

impl Environment {
    pub fn capture() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().and_then(|v| non_empty_string(&v));

        let cwd = std::env::current_dir()
            .map_err(|e| SubmitError::io(".", e))
            .and_then(|dir| {
                Utf8PathBuf::from_path_buf(dir).map_err(|dir| {
                    SubmitError::Other(format!(
                        "current directory {} is not valid UTF-8",
                        dir.display()
                    ))
                })
            })?;
        let home = dirs::home_dir().and_then(|h| Utf8PathBuf::from_path_buf(h).ok());
        let default_lib = std::env::current_exe()
            .ok()
            .and_then(|exe| Utf8PathBuf::from_path_buf(exe).ok())
            .and_then(|exe| exe.parent().map(|bin| bin.join("../lib/scripts")));

        Ok(Self {
            mode: var("SUBMIT_MODE"),
            lib: var("SUBMIT_LIB"),
            log: var("SUBMIT_LOG").map(Utf8PathBuf::from),
            home,
            cwd,
            default_lib,
        })
    }

    fn library(&self, flag: Option<&str>) -> ScriptLibrary {
        match flag.or(self.lib.as_deref()) {
            Some(path) => ScriptLibrary::from_search_path(path),
            None => self
                .default_lib
                .as_deref()
                .map(|dir| ScriptLibrary::from_search_path(dir.as_str()))
                .unwrap_or_default(),
        }
    }
}

/// What one invocation asks for.
#[derive(Debug)]
pub enum Action {
    Submit(Box<SubmissionRequest>),
    /// `-ls`: list library scripts matching `patterns`.
    List {
        library: ScriptLibrary,
        patterns: Vec<String>,
    },
    /// `-v`, `-vv`, `-vvv`: show a script's documentation.
    View {
        name: String,
        path: Utf8PathBuf,
        level: u8,
    },
}

/// Read the options file for `mode`.
///
/// `conf` is resolved against the home directory unless absolute; without
/// it the per-mode default (`~/.sbatchrc`, `~/.qsubrc`) is used. A missing
/// file yields no directives.
pub fn load_config(
    mode: Mode,
    conf: Option<&Utf8Path>,
    home: Option<&Utf8Path>,
) -> Result<Vec<String>> {
    let name = conf.unwrap_or_else(|| Utf8Path::new(mode.default_config_name()));
    let path = if name.is_absolute() {
        name.to_path_buf()
    } else {
        match home {
            Some(home) => home.join(name),
            None => return Ok(Vec::new()),
        }
    };

    match fs::read_to_string(&path) {
        Ok(content) => {
            let directives = parse_config_lines(&content);
            tracing::debug!("Loaded {} directives from {}", directives.len(), path);
            Ok(directives)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No options file at {}", path);
            Ok(Vec::new())
        }
        Err(e) => Err(SubmitError::io(path, e)),
    }
}

/// Build the [`Action`] for `args`.
///
/// Checks run in exit-code order: mode, script name, script location. Array
/// files are checked later by the resolver.
pub fn normalize(args: Args, env: &Environment) -> Result<Action> {
    let library = env.library(args.lib.as_deref());

    if args.ls {
        return Ok(Action::List {
            library,
            patterns: args.command,
        });
    }

    if args.view > 0 {
        let name = args
            .script()
            .ok_or(SubmitError::MissingScriptName)?
            .to_string();
        let path = library.locate(&name, &env.cwd)?;
        return Ok(Action::View {
            name,
            path,
            level: args.view,
        });
    }

    let mode = Mode::resolve(args.mode.as_deref(), env.mode.as_deref())?;
    let name = args
        .script()
        .ok_or(SubmitError::MissingScriptName)?
        .to_string();
    let path = library.locate(&name, &env.cwd)?;
    let script_args = args.script_args().to_vec();

    let mut extra_options = Vec::new();
    for value in &args.option {
        extra_options.extend(split_directives(value)?);
    }
    let config = load_config(mode, args.conf.as_deref(), env.home.as_deref())?;
    let config_options = merge_directives(config, &extra_options);

    let done_file_pattern = match args.done {
        Some(_) if args.no_modify => {
            tracing::warn!("-done is ignored with -n: the done file needs a modified script");
            None
        }
        done => done.and_then(|d| non_empty_string(&d)),
    };

    let array = match (&args.array, &args.file_array, &args.args_array) {
        (Some(range), _, _) => Some(ArrayRequest::Range(range.clone())),
        (None, Some(spec), _) => Some(ArrayRequest::File {
            spec: spec.clone(),
            split_args: false,
        }),
        (None, None, Some(spec)) => Some(ArrayRequest::File {
            spec: spec.clone(),
            split_args: true,
        }),
        (None, None, None) => None,
    };

    let output_dir = args.output_dir.clone().or_else(|| {
        env.cwd
            .join("log")
            .is_dir()
            .then(|| Utf8PathBuf::from("log"))
    });

    let mut request = SubmissionRequest::new(mode, name, path);
    request.script_args = script_args;
    request.done_file_pattern = done_file_pattern;
    request.after_job_ids = args.after;
    request.array = array;
    request.extra_options = extra_options;
    request.config_options = config_options;
    request.comment = args.comment;
    request.queue = args.queue;
    request.no_modify = args.no_modify;
    request.wait = args.wait;
    request.dry_run = args.dry_run || args.debug >= 2;
    request.log_path = args.log.or_else(|| env.log.clone());
    request.output_dir = output_dir;
    request.working_dir = env.cwd.clone();

    Ok(Action::Submit(Box::new(request)))
}
