//! Error types for the editing session and the generation client

use std::io;
use thiserror::Error;

/// Errors raised by the editing session, its codecs and the export pipeline
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Nothing to export: no base image loaded")]
    NothingToExport,

    #[error("Rasterization failed: {0}")]
    Raster(String),

    #[error("Corrupt history snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Session is no longer mounted")]
    Unmounted,

    #[error("Invalid config: {0}")]
    Config(String),
}

/// Errors from talking to the remote generation service
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Prompt is empty")]
    EmptyPrompt,

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    #[error("Service returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Generation failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Editor(#[from] EditorError),
}

impl From<EditorError> for String {
    fn from(err: EditorError) -> Self {
        err.to_string()
    }
}

impl From<GenerationError> for String {
    fn from(err: GenerationError) -> Self {
        err.to_string()
    }
}
