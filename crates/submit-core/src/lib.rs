//! Submission model for submit.
//!
//! Holds the request model, the backend capability trait, the array and
//! dependency resolver and the script instrumenter.

pub mod backend;
pub mod error;
pub mod history;
pub mod instrument;
pub mod library;
pub mod request;
pub mod resolve;

pub use backend::{
    ArgumentBinding, BackendAdapter, BackendCommand, FileArrayBinding, OutputPaths,
};
pub use error::{Result, SubmitError};
pub use history::{HistoryEntry, append_entry};
pub use instrument::{InstrumentedScript, instrument};
pub use library::{LibraryListing, ScriptInfo, ScriptLibrary, parse_script_info, render_view};
pub use request::{ArrayRequest, Mode, SubmissionRequest};
pub use resolve::{ResolvedArray, ResolvedRequest, resolve, resolve_array, resolve_dependencies};
