use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a run. Everything else is wrapped in `anyhow` context.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("GET {url} returned HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("response body could not be decoded: {0}")]
    Decode(String),

    #[error("template '{name}' not found")]
    MissingTemplate { name: String },

    #[error("store {path:?} does not exist (run `ingest` first)")]
    MissingStore { path: PathBuf },
}
