//! Error types for Ptycho

use std::any::Any;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtychoError {
    // Product errors
    #[error("Product not found at index {index}")]
    ProductNotFound { index: usize },

    #[error("Product handle {handle} is stale (item was removed)")]
    StaleProductHandle { handle: String },

    // Pattern errors
    #[error("No diffraction patterns loaded. Open a patterns file first")]
    PatternsNotLoaded,

    #[error("Bad pixel mask is missing from the assembled patterns")]
    BadPixelsMissing,

    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: String,
        found: String,
    },

    // Plugin errors
    #[error("Plugin \"{name}\" not found in {registry}. Available: {available}")]
    PluginNotFound {
        name: String,
        registry: String,
        available: String,
    },

    #[error("No plugins registered in {registry}")]
    NoPluginRegistered { registry: String },

    // Reconstruction errors
    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    #[error("Remote execution unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    // Automation errors
    #[error("Workflow failed for {path}: {reason}")]
    WorkflowFailed { path: PathBuf, reason: String },

    #[error("Invalid watch pattern \"{pattern}\": {reason}")]
    InvalidWatchPattern { pattern: String, reason: String },

    #[error("Watcher error: {0}")]
    Watcher(String),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PtychoError {
    fn from(err: serde_json::Error) -> Self {
        PtychoError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PtychoError>;

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
