//! Shared parsing utilities for scheduler submission.
//!
//! This crate provides the grammar helpers used by both
//! submit-slurm and submit-pbs: array specs, pass-through directives,
//! job-id extraction and running the backend binary.

pub mod array;
pub mod command;
pub mod jobid;
pub mod options;

pub use array::{ArraySpecError, FileSpec, RangeSpec, parse_file_spec, parse_range_spec};
pub use command::{CommandError, CommandOutput, run_command};
pub use jobid::{JobIdError, JobIdRule};
pub use options::{
    DirectiveError, directive_keys, merge_directives, parse_config_lines, split_directives,
};

/// Filter helper for optional string values.
/// Returns None if the string is empty or only whitespace.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Quote a value for inclusion in generated shell text.
///
/// Values made only of characters that the shell never reinterprets are
/// returned as-is; everything else is wrapped in single quotes.
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | ',' | '=' | '+' | '%' | '@')
        });
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
