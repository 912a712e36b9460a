//src/error.rs

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::invoke::Tool;

/// Everything that can stop a batch run.
///
/// Malformed table rows and empty result sets never show up here: they are
/// recovered where they are read and only surface through the summary numbers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The read-type tag was neither `illumina` nor `nanopore`.
    #[error("invalid read type '{0}': expected 'illumina' or 'nanopore'")]
    InvalidReadType(String),

    /// A configuration value is unusable (missing catalog, zero threads, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O on a file or directory this crate owns (output dir, scratch space).
    #[error("I/O error during {operation} on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// The external binary could not be started at all.
    #[error("failed to launch {tool} ('{}'): {source}", .program.display())]
    Launch {
        tool: Tool,
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Averaging was requested over zero samples.
    #[error("cannot average over an empty batch (0 samples)")]
    EmptyBatch,
}

impl PipelineError {
    /// Adapter for `map_err` that attaches the path and the operation being performed.
    pub(crate) fn io(
        path: impl Into<PathBuf>,
        operation: &'static str,
    ) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| PipelineError::Io {
            path,
            operation,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
