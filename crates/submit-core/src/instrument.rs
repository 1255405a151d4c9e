//! Script instrumentation.
//!
//! The submitted script is rewritten as
//!
//! ```text
//! <leading header: shebang, blank lines, #SBATCH/#PBS directives, ## docs>
//! <prologue: finalizer trap, command line, start time, bindings>
//! <original body, untouched>
//! ```
//!
//! The epilogue lives in a function installed as the shell's EXIT trap, so
//! it runs on every exit path of the body: falling off the end, an explicit
//! `exit`, a failing command under `set -e`, or a HUP/INT/TERM delivered by
//! the scheduler (those are turned into ordinary exits first).

use crate::backend::{ArgumentBinding, BackendAdapter, FileArrayBinding};
use crate::resolve::{ResolvedArray, ResolvedRequest};
use submit_parsers::shell_quote;

const DEFAULT_SHEBANG: &str = "#!/bin/bash\n";

/// Result of instrumenting a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedScript {
    pub body: String,
    /// False when the original was passed through untouched (`-n`).
    pub modified: bool,
}

/// Split the script into its leading comment header and the rest.
///
/// The header is every leading line that is blank or starts with `#`.
fn split_header(script: &str) -> (&str, &str) {
    let mut end = 0;
    for line in script.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            end += line.len();
        } else {
            break;
        }
    }
    script.split_at(end)
}

fn push_line(out: &mut String, line: impl AsRef<str>) {
    out.push_str(line.as_ref());
    out.push('\n');
}

/// Shell expression for the done file, with the first `@` replaced by the
/// runtime value of `job_id_var`.
fn done_file_expr(pattern: &str, job_id_var: &str) -> String {
    let quote_part = |s: &str| if s.is_empty() { String::new() } else { shell_quote(s) };
    match pattern.split_once('@') {
        Some((before, after)) => format!(
            "{}\"${{{}}}\"{}",
            quote_part(before),
            job_id_var,
            quote_part(after)
        ),
        None => shell_quote(pattern),
    }
}

fn write_finalizer(out: &mut String, request: &ResolvedRequest, adapter: &dyn BackendAdapter) {
    push_line(out, "_SUBMIT_TS=$(date +%s)");
    push_line(out, "_SUBMIT_ORIG_PWD=$PWD");
    push_line(out, "_submit_finish() {");
    push_line(out, "    _SUBMIT_RC=$?");
    push_line(out, "    trap - EXIT");
    push_line(out, "    echo \"%Terminated: $(date)\"");
    push_line(
        out,
        "    echo \"%Elapsed: $(( $(date +%s) - _SUBMIT_TS )) seconds\"",
    );
    if let Some(pattern) = &request.request.done_file_pattern {
        push_line(out, "    cd \"$_SUBMIT_ORIG_PWD\" || :");
        push_line(
            out,
            format!(
                "    _SUBMIT_DONE={}",
                done_file_expr(pattern, adapter.job_id_var())
            ),
        );
        push_line(
            out,
            "    echo \"$_SUBMIT_RC\" > \"$_SUBMIT_DONE.tmp.$$\" && mv -f \"$_SUBMIT_DONE.tmp.$$\" \"$_SUBMIT_DONE\"",
        );
    }
    push_line(out, "    exit \"$_SUBMIT_RC\"");
    push_line(out, "}");
    push_line(out, "trap _submit_finish EXIT");
    push_line(out, "trap 'exit 129' HUP");
    push_line(out, "trap 'exit 130' INT");
    push_line(out, "trap 'exit 143' TERM");
}

fn write_argument_bindings(out: &mut String, args: &[String], binding: ArgumentBinding) {
    if args.is_empty() {
        return;
    }
    let mut names = vec!["args".to_string()];
    match binding {
        ArgumentBinding::Native => {
            push_line(out, "args=\"$*\"");
            for i in 1..=args.len() {
                push_line(out, format!("arg{i}=\"${{{i}}}\""));
                names.push(format!("arg{i}"));
            }
        }
        ArgumentBinding::Injected => {
            push_line(out, format!("args={}", shell_quote(&args.join(" "))));
            for (i, arg) in args.iter().enumerate() {
                push_line(out, format!("arg{}={}", i + 1, shell_quote(arg)));
                names.push(format!("arg{}", i + 1));
            }
        }
    }
    push_line(out, format!("export {}", names.join(" ")));
}

fn write_file_array_lookup(out: &mut String, array: &ResolvedArray, binding: FileArrayBinding) {
    let ResolvedArray::File {
        path, split_args, ..
    } = array
    else {
        return;
    };
    if let FileArrayBinding::Injected { index_var } = binding {
        push_line(
            out,
            format!(
                "JOB_FILEARRAY_LINE=$(sed \"${{{}}}q;d\" {})",
                index_var,
                shell_quote(path.as_str())
            ),
        );
        push_line(out, "export JOB_FILEARRAY_LINE");
    }
    if *split_args {
        push_line(
            out,
            "IFS=$'\\t' read -r -a JOB_FILEARRAY_ARGS <<< \"$JOB_FILEARRAY_LINE\"",
        );
    }
}

/// Build the prologue inserted between the header and the body.
pub fn prologue(request: &ResolvedRequest, adapter: &dyn BackendAdapter) -> String {
    let mut out = String::new();
    push_line(&mut out, "");
    write_finalizer(&mut out, request, adapter);
    push_line(
        &mut out,
        format!(
            "printf '%s\\n' {}",
            shell_quote(&format!("%Commandline: {}", request.request.command_line()))
        ),
    );
    push_line(&mut out, "echo \"%Started: $(date)\"");
    write_argument_bindings(
        &mut out,
        &request.request.script_args,
        adapter.argument_binding(),
    );
    if let Some(array) = &request.array {
        write_file_array_lookup(&mut out, array, adapter.file_array_binding());
    }
    push_line(&mut out, "");
    out
}

/// Rewrite `original` for submission.
///
/// With `no_modify` set the script is returned byte for byte.
pub fn instrument(
    original: &str,
    request: &ResolvedRequest,
    adapter: &dyn BackendAdapter,
) -> InstrumentedScript {
    if request.request.no_modify {
        return InstrumentedScript {
            body: original.to_string(),
            modified: false,
        };
    }

    let (header, rest) = split_header(original);
    let prologue = prologue(request, adapter);

    let mut body = String::with_capacity(original.len() + prologue.len() + DEFAULT_SHEBANG.len());
    if !header.starts_with("#!") {
        body.push_str(DEFAULT_SHEBANG);
    }
    body.push_str(header);
    if !header.is_empty() && !header.ends_with('\n') {
        body.push('\n');
    }
    body.push_str(&prologue);
    body.push_str(rest);

    InstrumentedScript {
        body,
        modified: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, OutputPaths};
    use crate::request::{Mode, SubmissionRequest};
    use camino::Utf8Path;
    use std::process::Command;
    use submit_parsers::JobIdRule;
    use tempfile::TempDir;

    struct TestAdapter {
        binding: ArgumentBinding,
        rule: JobIdRule,
    }

    impl TestAdapter {
        fn new(binding: ArgumentBinding) -> Self {
            Self {
                binding,
                rule: JobIdRule::new(r"(\d+)").unwrap(),
            }
        }
    }

    impl BackendAdapter for TestAdapter {
        fn mode(&self) -> Mode {
            Mode::Slurm
        }
        fn program(&self) -> &str {
            "true"
        }
        fn job_id_var(&self) -> &'static str {
            "TEST_JOB_ID"
        }
        fn dependency_directive(&self, _job_ids: &[String]) -> Vec<String> {
            Vec::new()
        }
        fn array_directive(&self, _array: &ResolvedArray) -> Vec<String> {
            Vec::new()
        }
        fn argument_binding(&self) -> ArgumentBinding {
            self.binding
        }
        fn file_array_binding(&self) -> FileArrayBinding {
            FileArrayBinding::Injected {
                index_var: "TEST_TASK_ID",
            }
        }
        fn output_paths(
            &self,
            script_base: &str,
            _suffix: Option<&str>,
            _dir: &Utf8Path,
            _array: bool,
        ) -> OutputPaths {
            OutputPaths {
                job_name: script_base.to_string(),
                stdout: String::new(),
                stderr: String::new(),
            }
        }
        fn job_id_rule(&self) -> &JobIdRule {
            &self.rule
        }
        fn build_command(&self, _request: &ResolvedRequest, _script: &Utf8Path) -> BackendCommand {
            BackendCommand::new("true")
        }
    }

    fn resolved(dir: &Utf8Path, configure: impl FnOnce(&mut SubmissionRequest)) -> ResolvedRequest {
        let mut request = SubmissionRequest::new(Mode::Slurm, "job.qsub", dir.join("job.qsub"));
        configure(&mut request);
        crate::resolve::resolve(request).unwrap()
    }

    fn run_bash(dir: &Utf8Path, script: &str, args: &[&str], task: Option<&str>) -> (i32, String) {
        let path = dir.join("instrumented.sh");
        std::fs::write(&path, script).unwrap();
        let mut cmd = Command::new("bash");
        cmd.arg(path.as_str())
            .args(args)
            .current_dir(dir)
            .env("TEST_JOB_ID", "77");
        if let Some(task) = task {
            cmd.env("TEST_TASK_ID", task);
        }
        let output = cmd.output().unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
        )
    }

    const SCRIPT: &str = "#!/bin/bash\n## Align reads.\n## arg1: sample\n#SBATCH --mem=4G\n\necho body-start\nexit 3\n";

    #[test]
    fn test_split_header() {
        let (header, rest) = split_header(SCRIPT);
        assert_eq!(header, "#!/bin/bash\n## Align reads.\n## arg1: sample\n#SBATCH --mem=4G\n\n");
        assert_eq!(rest, "echo body-start\nexit 3\n");

        let (header, rest) = split_header("# only comments");
        assert_eq!(header, "# only comments");
        assert_eq!(rest, "");
    }

    #[test]
    fn test_no_modify_is_identity() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| {
            r.no_modify = true;
            r.done_file_pattern = Some("@.done".into());
        });
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument(SCRIPT, &request, &adapter);
        assert!(!script.modified);
        assert_eq!(script.body.as_bytes(), SCRIPT.as_bytes());
    }

    #[test]
    fn test_header_preserved_at_top() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |_| {});
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument(SCRIPT, &request, &adapter);
        assert!(script.modified);
        assert!(script.body.starts_with("#!/bin/bash\n## Align reads.\n## arg1: sample\n#SBATCH --mem=4G\n"));
        assert!(script.body.ends_with("echo body-start\nexit 3\n"));
        let trap = script.body.find("trap _submit_finish EXIT").unwrap();
        let body = script.body.find("echo body-start").unwrap();
        assert!(trap < body);
    }

    #[test]
    fn test_missing_shebang_is_added() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |_| {});
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument("echo hi\n", &request, &adapter);
        assert!(script.body.starts_with("#!/bin/bash\n\n_SUBMIT_TS="));
    }

    #[test]
    fn test_done_file_expr() {
        assert_eq!(done_file_expr("@.done", "SLURM_JOB_ID"), "\"${SLURM_JOB_ID}\".done");
        assert_eq!(
            done_file_expr("out dir/step1.@.ok", "PBS_JOBID"),
            "'out dir/step1.'\"${PBS_JOBID}\".ok"
        );
        assert_eq!(done_file_expr("finished", "PBS_JOBID"), "finished");
    }

    #[test]
    fn test_done_file_created_after_body_with_exit_status() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| r.done_file_pattern = Some("step1.@.done".into()));
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let original = "#!/bin/bash\ntest -e step1.77.done && echo EARLY\necho body-ran\nexit 3\n";
        let script = instrument(original, &request, &adapter);

        let (code, stdout) = run_bash(dir, &script.body, &[], None);
        assert_eq!(code, 3);
        assert!(!stdout.contains("EARLY"));

        let lines: Vec<&str> = stdout.lines().collect();
        assert!(lines[0].starts_with("%Commandline: job.qsub"));
        assert!(lines[1].starts_with("%Started: "));
        assert_eq!(lines[2], "body-ran");
        assert!(lines[3].starts_with("%Terminated: "));
        assert!(lines[4].starts_with("%Elapsed: "));

        let done = std::fs::read_to_string(dir.join("step1.77.done")).unwrap();
        assert_eq!(done, "3\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_done_file_on_success_and_cd() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::create_dir(dir.join("sub")).unwrap();
        let request = resolved(dir, |r| r.done_file_pattern = Some("@.done".into()));
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument("cd sub\ntrue\n", &request, &adapter);

        let (code, _) = run_bash(dir, &script.body, &[], None);
        assert_eq!(code, 0);
        assert_eq!(std::fs::read_to_string(dir.join("77.done")).unwrap(), "0\n");
        assert!(!dir.join("sub").join("77.done").exists());
    }

    #[test]
    fn test_done_file_on_termination_signal() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| r.done_file_pattern = Some("@.done".into()));
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument("kill -TERM $$\nsleep 5\necho unreachable\n", &request, &adapter);

        let (code, stdout) = run_bash(dir, &script.body, &[], None);
        assert_eq!(code, 143);
        assert!(!stdout.contains("unreachable"));
        assert_eq!(std::fs::read_to_string(dir.join("77.done")).unwrap(), "143\n");
    }

    #[test]
    fn test_injected_argument_binding() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| r.script_args = vec!["a b".into(), "it's".into()]);
        let adapter = TestAdapter::new(ArgumentBinding::Injected);
        let script = instrument("echo \"1=$arg1 2=$arg2 all=$args\"\n", &request, &adapter);

        let (code, stdout) = run_bash(dir, &script.body, &[], None);
        assert_eq!(code, 0);
        assert!(stdout.contains("1=a b 2=it's all=a b it's"));
    }

    #[test]
    fn test_native_argument_binding() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| r.script_args = vec!["x".into(), "y z".into()]);
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument("echo \"1=$arg1 2=$arg2 first=$1\"\n", &request, &adapter);
        assert!(!script.body.contains("arg1=x"));

        let (code, stdout) = run_bash(dir, &script.body, &["x", "y z"], None);
        assert_eq!(code, 0);
        assert!(stdout.contains("1=x 2=y z first=x"));
    }

    #[test]
    fn test_file_array_lookup() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        std::fs::write(dir.join("names.txt"), "S1\tfirst\nS2\tsecond\nS3\tthird\n").unwrap();
        let request = resolved(dir, |r| {
            r.array = Some(crate::request::ArrayRequest::File {
                spec: "names.txt%2".into(),
                split_args: true,
            })
        });
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument(
            "echo \"line=$JOB_FILEARRAY_LINE col1=${JOB_FILEARRAY_ARGS[1]}\"\n",
            &request,
            &adapter,
        );

        let (code, stdout) = run_bash(dir, &script.body, &[], Some("2"));
        assert_eq!(code, 0);
        assert!(stdout.contains("line=S2\tsecond col1=second"));
    }

    #[test]
    fn test_range_array_has_no_lookup() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let request = resolved(dir, |r| {
            r.array = Some(crate::request::ArrayRequest::Range("0-15%4".into()))
        });
        let adapter = TestAdapter::new(ArgumentBinding::Native);
        let script = instrument("true\n", &request, &adapter);
        assert!(!script.body.contains("JOB_FILEARRAY_LINE"));
    }
}
