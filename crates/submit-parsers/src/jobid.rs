//! Job id extraction from a scheduler's submission output.
//!
//! The exact text printed by `sbatch`/`qsub` differs across versions and
//! site wrappers, so the rule is a regex that callers can replace.

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobIdError {
    #[error("invalid job id pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("no job id found in scheduler output: {output:?}")]
    NoMatch { output: String },
}

/// A regex-based job id extraction rule.
///
/// The first capture group is the job id; a pattern without groups uses
/// the whole match.
#[derive(Debug, Clone)]
pub struct JobIdRule {
    pattern: Regex,
}

impl JobIdRule {
    pub fn new(pattern: &str) -> Result<Self, JobIdError> {
        let pattern = Regex::new(pattern).map_err(|source| JobIdError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    pub fn from_regex(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Extract the job id from the submission command's stdout.
    pub fn extract(&self, output: &str) -> Result<String, JobIdError> {
        let captures = self
            .pattern
            .captures(output)
            .ok_or_else(|| JobIdError::NoMatch {
                output: output.trim().to_string(),
            })?;
        let id = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        if id.is_empty() {
            return Err(JobIdError::NoMatch {
                output: output.trim().to_string(),
            });
        }
        Ok(id)
    }
}
