//! CLI error types and conversions

use crate::collector::CollectError;
use crate::export::ExportError;
use crate::resume::ResumeError;
use crate::surface::SurfaceError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Collection failed before producing an outcome
    #[error("collect error: {0}")]
    CollectError(#[from] CollectError),

    /// Surface could not be created
    #[error("surface error: {0}")]
    SurfaceError(#[from] SurfaceError),

    /// Export error
    #[error("export error: {0}")]
    ExportError(#[from] ExportError),

    /// Checkpoint error
    #[error("checkpoint error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
