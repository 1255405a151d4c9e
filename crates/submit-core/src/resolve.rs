//! Dependency and job array resolution.
//!
//! Runs once between normalization and instrumentation. The result is
//! immutable and shared by the instrumenter and the backend adapter.

use crate::error::{Result, SubmitError};
use crate::request::{ArrayRequest, SubmissionRequest};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use submit_parsers::{ArraySpecError, RangeSpec, parse_file_spec, parse_range_spec};

/// A validated job array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedArray {
    /// Index range given with `-t`.
    Range {
        low: u64,
        high: u64,
        concurrency: Option<u32>,
    },
    /// One task per line of `path`; tasks are numbered from 1.
    File {
        path: Utf8PathBuf,
        lines: u64,
        concurrency: Option<u32>,
        split_args: bool,
    },
}

impl ResolvedArray {
    /// The index range as the scheduler sees it.
    pub fn range(&self) -> RangeSpec {
        match self {
            Self::Range {
                low,
                high,
                concurrency,
            } => RangeSpec {
                low: *low,
                high: *high,
                concurrency: *concurrency,
            },
            Self::File {
                lines, concurrency, ..
            } => RangeSpec {
                low: 1,
                high: *lines,
                concurrency: *concurrency,
            },
        }
    }

    pub fn task_count(&self) -> u64 {
        self.range().task_count()
    }

    pub fn concurrency(&self) -> Option<u32> {
        self.range().concurrency
    }

    /// The array file, for the file form.
    pub fn file(&self) -> Option<&Utf8Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Range { .. } => None,
        }
    }
}

/// A request after dependency and array resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRequest {
    pub request: SubmissionRequest,
    /// Job ids the submission waits for, in order, without placeholders.
    pub dependencies: Vec<String>,
    pub array: Option<ResolvedArray>,
}

impl ResolvedRequest {
    /// Whether the instrumented script will create a done file.
    pub fn creates_done_file(&self) -> bool {
        !self.request.no_modify && self.request.done_file_pattern.is_some()
    }
}

/// Normalize `-after` ids: trim, drop empties and the `0` placeholder.
pub fn resolve_dependencies(ids: &[String]) -> Vec<String> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && *id != "0")
        .map(str::to_string)
        .collect()
}

/// Count lines the way a line-by-line reader does: a final line without a
/// trailing newline still counts.
fn count_lines(path: &Utf8Path) -> std::io::Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Validate an array request. Relative file paths are anchored at `cwd`.
pub fn resolve_array(array: &ArrayRequest, cwd: &Utf8Path) -> Result<ResolvedArray> {
    match array {
        ArrayRequest::Range(spec) => {
            let range = parse_range_spec(spec)?;
            Ok(ResolvedArray::Range {
                low: range.low,
                high: range.high,
                concurrency: range.concurrency,
            })
        }
        ArrayRequest::File { spec, split_args } => {
            let file = parse_file_spec(spec)?;
            let path = cwd.join(&file.path);
            if !path.is_file() {
                return Err(SubmitError::MissingArrayFile(path));
            }
            let lines = count_lines(&path).map_err(|e| SubmitError::io(&path, e))?;
            if lines == 0 {
                return Err(SubmitError::InvalidArraySpec(ArraySpecError::Malformed(
                    format!("{spec} (file is empty)"),
                )));
            }
            Ok(ResolvedArray::File {
                path,
                lines,
                concurrency: file.concurrency,
                split_args: *split_args,
            })
        }
    }
}

/// Enrich a request with its validated dependencies and array.
pub fn resolve(request: SubmissionRequest) -> Result<ResolvedRequest> {
    let dependencies = resolve_dependencies(&request.after_job_ids);
    let array = request
        .array
        .as_ref()
        .map(|array| resolve_array(array, &request.working_dir))
        .transpose()?;

    if let Some(array) = &array {
        tracing::debug!(
            tasks = array.task_count(),
            concurrency = ?array.concurrency(),
            "resolved job array"
        );
    }

    Ok(ResolvedRequest {
        request,
        dependencies,
        array,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Mode;
    use std::io::Write;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> &Utf8Path {
        Utf8Path::from_path(dir.path()).unwrap()
    }

    #[test]
    fn test_resolve_dependencies_drops_placeholders() {
        let ids = vec!["123".to_string(), "0".to_string(), " ".to_string(), "456 ".to_string()];
        assert_eq!(resolve_dependencies(&ids), vec!["123", "456"]);
    }

    #[test]
    fn test_resolve_range() {
        let temp = TempDir::new().unwrap();
        let array = resolve_array(&ArrayRequest::Range("0-15%4".into()), utf8(&temp)).unwrap();
        assert_eq!(
            array,
            ResolvedArray::Range {
                low: 0,
                high: 15,
                concurrency: Some(4)
            }
        );
        assert_eq!(array.task_count(), 16);
        assert!(array.file().is_none());
    }

    #[test]
    fn test_resolve_file_counts_lines() {
        let temp = TempDir::new().unwrap();
        let mut f = File::create(temp.path().join("names.txt")).unwrap();
        for i in 0..9 {
            writeln!(f, "sample{i}").unwrap();
        }
        // Last line without trailing newline still counts
        write!(f, "sample9").unwrap();
        drop(f);

        let request = ArrayRequest::File {
            spec: "names.txt%4".into(),
            split_args: false,
        };
        let array = resolve_array(&request, utf8(&temp)).unwrap();
        assert_eq!(array.task_count(), 10);
        assert_eq!(array.concurrency(), Some(4));
        assert_eq!(array.range().render(), "1-10%4");
        assert_eq!(array.file().unwrap(), utf8(&temp).join("names.txt"));
    }

    #[test]
    fn test_resolve_missing_file() {
        let temp = TempDir::new().unwrap();
        let request = ArrayRequest::File {
            spec: "names.txt%4".into(),
            split_args: false,
        };
        let err = resolve_array(&request, utf8(&temp)).unwrap_err();
        assert!(matches!(err, SubmitError::MissingArrayFile(_)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_resolve_empty_file() {
        let temp = TempDir::new().unwrap();
        File::create(temp.path().join("empty.txt")).unwrap();
        let request = ArrayRequest::File {
            spec: "empty.txt".into(),
            split_args: true,
        };
        assert!(matches!(
            resolve_array(&request, utf8(&temp)),
            Err(SubmitError::InvalidArraySpec(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_uncountable_range() {
        let temp = TempDir::new().unwrap();
        let script = utf8(&temp).join("job.qsub");
        let mut request = SubmissionRequest::new(Mode::Slurm, "job.qsub", script);
        request.array = Some(ArrayRequest::Range("0-18446744073709551615".into()));
        let err = resolve(request).unwrap_err();
        assert!(matches!(
            err,
            SubmitError::InvalidArraySpec(ArraySpecError::TooLarge(_))
        ));
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_resolve_request() {
        let temp = TempDir::new().unwrap();
        let script = utf8(&temp).join("job.qsub");
        let mut request = SubmissionRequest::new(Mode::Pbs, "job.qsub", script);
        request.after_job_ids = vec!["0".into(), "77".into()];
        request.array = Some(ArrayRequest::Range("1-3".into()));
        request.done_file_pattern = Some("@.done".into());

        let resolved = resolve(request).unwrap();
        assert_eq!(resolved.dependencies, vec!["77"]);
        assert_eq!(resolved.array.as_ref().unwrap().task_count(), 3);
        assert!(resolved.creates_done_file());
    }
}
