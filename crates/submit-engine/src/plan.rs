//! Turn a resolved request into a ready-to-run backend command.

use crate::backend::Backend;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io::Write;
use submit_core::{
    BackendCommand, InstrumentedScript, ResolvedRequest, Result, SubmitError, instrument,
};
use tempfile::NamedTempFile;

/// The script file handed to the backend.
#[derive(Debug)]
pub enum StagedScript {
    /// The user's script, submitted as-is.
    Original(Utf8PathBuf),
    /// An instrumented copy, deleted when dropped. The scheduler copies
    /// the script at submission time, so it only has to outlive the
    /// backend process.
    Temporary {
        file: NamedTempFile,
        path: Utf8PathBuf,
    },
}

impl StagedScript {
    pub fn path(&self) -> &Utf8Path {
        match self {
            StagedScript::Original(path) => path,
            StagedScript::Temporary { path, .. } => path,
        }
    }

    fn stage(body: &str, script_base: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("submit-")
            .suffix(&format!("-{script_base}"))
            .tempfile()
            .map_err(|e| SubmitError::io(std::env::temp_dir().to_string_lossy().to_string(), e))?;
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).map_err(|p| {
            SubmitError::Other(format!("temporary script path {} is not UTF-8", p.display()))
        })?;
        file.write_all(body.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SubmitError::io(&path, e))?;
        Ok(StagedScript::Temporary { file, path })
    }
}

/// Everything needed to submit, built before the backend is touched.
#[derive(Debug)]
pub struct Plan {
    pub resolved: ResolvedRequest,
    pub script: InstrumentedScript,
    pub staged: StagedScript,
    pub command: BackendCommand,
}

/// Instrument the script, stage it and build the backend command.
pub fn plan(resolved: ResolvedRequest, backend: &Backend) -> Result<Plan> {
    let adapter = backend.adapter();
    let request = &resolved.request;

    let original = fs::read_to_string(&request.script_path)
        .map_err(|e| SubmitError::io(&request.script_path, e))?;
    let script = instrument(&original, &resolved, adapter);

    let staged = if script.modified {
        StagedScript::stage(&script.body, request.script_base_name())?
    } else {
        StagedScript::Original(request.script_path.clone())
    };

    let command = adapter.build_command(&resolved, staged.path());
    tracing::debug!("Executing: {}", command);

    Ok(Plan {
        resolved,
        script,
        staged,
        command,
    })
}
