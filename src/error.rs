// src/error.rs

//! Unified error handling for the IPO board service.

use std::fmt;

use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource does not exist (unknown year or slug)
    #[error("{resource} not found: {key}")]
    NotFound { resource: &'static str, key: String },

    /// Caller supplied a bad argument (invalid status token, malformed path)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A per-record detail artifact could not be loaded
    #[error("Failed to load detail for '{slug}': {message}")]
    DetailLoad { slug: String, message: String },

    /// A full index rebuild failed; the previous snapshot stays published
    #[error("Index rebuild failed: {0}")]
    Rebuild(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a not-found error for a resource kind and key.
    pub fn not_found(resource: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a detail-load error for a specific slug.
    pub fn detail_load(slug: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DetailLoad {
            slug: slug.into(),
            message: message.to_string(),
        }
    }

    /// Create a rebuild error.
    pub fn rebuild(message: impl fmt::Display) -> Self {
        Self::Rebuild(message.to_string())
    }

    /// Whether this error maps to a client-side (4xx) response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidArgument(_))
    }
}
