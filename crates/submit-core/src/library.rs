//! Script library: locating scripts, listing them and reading their
//! `##` documentation header.

use crate::error::{Result, SubmitError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File extension of library scripts.
pub const SCRIPT_EXTENSION: &str = "qsub";

/// Ordered list of directories searched for scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLibrary {
    dirs: Vec<Utf8PathBuf>,
}

/// Scripts found in one library directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryListing {
    pub dir: Utf8PathBuf,
    pub scripts: Vec<String>,
}

impl ScriptLibrary {
    pub fn new(dirs: Vec<Utf8PathBuf>) -> Self {
        Self { dirs }
    }

    /// Parse a colon-separated search path, keeping existing directories.
    pub fn from_search_path(path: &str) -> Self {
        let dirs = path
            .split(':')
            .filter(|d| !d.is_empty())
            .map(Utf8PathBuf::from)
            .filter(|d| d.is_dir())
            .collect();
        Self { dirs }
    }

    pub fn dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    fn describe_dirs(&self) -> String {
        self.dirs
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Resolve `name` against `cwd` first, then each library directory.
    /// The returned path is absolute when `cwd` is.
    pub fn locate(&self, name: &str, cwd: &Utf8Path) -> Result<Utf8PathBuf> {
        let local = cwd.join(name);
        if local.is_file() {
            return Ok(local);
        }
        for dir in &self.dirs {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(if candidate.is_absolute() {
                    candidate
                } else {
                    cwd.join(candidate)
                });
            }
        }
        Err(SubmitError::ScriptNotFound {
            name: name.to_string(),
            library: self.describe_dirs(),
        })
    }

    /// List `*.qsub` scripts per directory, sorted, keeping names that
    /// contain any of `patterns` (all names when `patterns` is empty).
    pub fn list(&self, patterns: &[String]) -> Vec<LibraryListing> {
        let mut listings = Vec::new();
        for dir in &self.dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Cannot read script library {}: {}", dir, e);
                    continue;
                }
            };
            let mut scripts: Vec<String> = entries
                .flatten()
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| {
                    Utf8Path::new(name).extension() == Some(SCRIPT_EXTENSION)
                })
                .filter(|name| patterns.is_empty() || patterns.iter().any(|p| name.contains(p.as_str())))
                .collect();
            if scripts.is_empty() {
                continue;
            }
            scripts.sort();
            listings.push(LibraryListing {
                dir: dir.clone(),
                scripts,
            });
        }
        listings
    }
}

/// Documentation extracted from a script's `##` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptInfo {
    /// First `##` line.
    pub description: Option<String>,
    /// Consecutive `##` lines following the description.
    pub arguments: Vec<String>,
}

pub fn parse_script_info(content: &str) -> ScriptInfo {
    let mut info = ScriptInfo::default();
    let mut lines = content.lines().skip_while(|line| !line.starts_with("##"));

    if let Some(first) = lines.next() {
        info.description = Some(first[2..].trim().to_string());
        info.arguments = lines
            .take_while(|line| line.starts_with("##"))
            .map(|line| line[2..].trim_end().to_string())
            .collect();
    }
    info
}

/// Render the `-v`, `-vv` or `-vvv` view of a script.
pub fn render_view(name: &str, path: &Utf8Path, level: u8) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| SubmitError::io(path, e))?;
    if level >= 3 {
        return Ok(content);
    }

    let info = parse_script_info(&content);
    let mut out = format!("{} - {}\n", name, info.description.unwrap_or_default());
    if level == 2 {
        out.push_str("Arguments:\n");
        for arg in &info.arguments {
            out.push_str(&format!(" {arg}\n"));
        }
    }
    Ok(out)
}
