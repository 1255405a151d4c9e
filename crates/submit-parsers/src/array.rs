//! Job array specification grammar.
//!
//! Two forms are accepted:
//! - range: `LOW-HIGH` or `LOW-HIGH%N`
//! - file: `PATH` or `PATH%N`, one array task per line of `PATH`
//!
//! The concurrency cap `N` is only validated here; enforcing it is up to
//! the scheduler.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArraySpecError {
    #[error("array range `{0}` is not of the form LOW-HIGH[%N]")]
    Malformed(String),
    #[error("array range `{spec}`: low bound {low} is above high bound {high}")]
    Inverted { spec: String, low: u64, high: u64 },
    #[error("array concurrency in `{0}` must be a positive integer")]
    BadConcurrency(String),
    #[error("array range `{0}` has more tasks than can be counted")]
    TooLarge(String),
    #[error("array file spec is empty")]
    EmptyPath,
}

/// A parsed `LOW-HIGH[%N]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub low: u64,
    pub high: u64,
    pub concurrency: Option<u32>,
}

impl RangeSpec {
    /// Number of array tasks covered by the range (bounds inclusive).
    ///
    /// `None` when the count does not fit in a `u64` or the bounds are
    /// inverted.
    pub fn checked_task_count(&self) -> Option<u64> {
        self.high.checked_sub(self.low)?.checked_add(1)
    }

    /// Like [`checked_task_count`](Self::checked_task_count), saturating at
    /// the bounds. Ranges from [`parse_range_spec`] never saturate.
    pub fn task_count(&self) -> u64 {
        self.checked_task_count().unwrap_or(if self.low > self.high { 0 } else { u64::MAX })
    }

    /// Render in the `LOW-HIGH[%N]` syntax shared by sbatch and qsub.
    pub fn render(&self) -> String {
        match self.concurrency {
            Some(n) => format!("{}-{}%{}", self.low, self.high, n),
            None => format!("{}-{}", self.low, self.high),
        }
    }
}

/// A parsed `PATH[%N]` file spec. The path is not checked for existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub path: String,
    pub concurrency: Option<u32>,
}

/// Split off a trailing `%N` concurrency cap.
fn split_concurrency(spec: &str) -> Result<(&str, Option<u32>), ArraySpecError> {
    match spec.rsplit_once('%') {
        Some((head, cap)) => {
            let n: u32 = cap
                .trim()
                .parse()
                .map_err(|_| ArraySpecError::BadConcurrency(spec.to_string()))?;
            if n == 0 {
                return Err(ArraySpecError::BadConcurrency(spec.to_string()));
            }
            Ok((head, Some(n)))
        }
        None => Ok((spec, None)),
    }
}

/// Parse the range form used by `-t`.
pub fn parse_range_spec(spec: &str) -> Result<RangeSpec, ArraySpecError> {
    let spec = spec.trim();
    let (range, concurrency) = split_concurrency(spec)?;

    let (low, high) = range
        .split_once('-')
        .ok_or_else(|| ArraySpecError::Malformed(spec.to_string()))?;
    let low: u64 = low
        .trim()
        .parse()
        .map_err(|_| ArraySpecError::Malformed(spec.to_string()))?;
    let high: u64 = high
        .trim()
        .parse()
        .map_err(|_| ArraySpecError::Malformed(spec.to_string()))?;

    if low > high {
        return Err(ArraySpecError::Inverted {
            spec: spec.to_string(),
            low,
            high,
        });
    }

    let range = RangeSpec {
        low,
        high,
        concurrency,
    };
    if range.checked_task_count().is_none() {
        return Err(ArraySpecError::TooLarge(spec.to_string()));
    }
    Ok(range)
}

/// Parse the file form used by `-T` and `-A`.
pub fn parse_file_spec(spec: &str) -> Result<FileSpec, ArraySpecError> {
    let (path, concurrency) = split_concurrency(spec.trim())?;
    if path.is_empty() {
        return Err(ArraySpecError::EmptyPath);
    }
    Ok(FileSpec {
        path: path.to_string(),
        concurrency,
    })
}
