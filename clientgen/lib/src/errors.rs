//! Error types for the clientgen pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::adapters::FallbackMode;
use crate::detect::DetectError;
use crate::transform::TransformError;

/// Errors that end a pipeline run.
///
/// Selection and detection failures are enriched with the description path
/// and the active fallback mode so the CLI can print an actionable message
/// without knowing which stage produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The description document could not be read or parsed.
    #[error("Failed to load API description '{path}': {source}")]
    Description {
        path: PathBuf,
        #[source]
        source: DetectError,
    },

    /// No adapter supports the detected version and the mode forbids fallback.
    #[error(
        "Unsupported description version '{version}' in '{path}' (fallback mode: {mode}). Use --fallback=warn or --fallback=auto to generate with the default adapter"
    )]
    UnsupportedVersion {
        version: String,
        path: PathBuf,
        mode: FallbackMode,
    },

    /// The registry has nothing to fall back to.
    #[error("No adapter supports version '{version}' and no default adapter is registered")]
    NoDefaultAdapter { version: String },

    /// Required templates are absent and `--force` was not given.
    #[error("Missing {} required template(s) in '{dir}': {}", missing.len(), missing.join(", "))]
    MissingTemplates { dir: PathBuf, missing: Vec<String> },

    /// The selected adapter failed to produce output.
    #[error("Generator '{adapter}' failed: {message}")]
    Generator { adapter: String, message: String },

    /// Failed to read a generated file.
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A post-processing transform could not run on a file.
    #[error("Transform failed for '{path}': {source}")]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    /// Walking the output directory failed.
    #[error("Failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}
