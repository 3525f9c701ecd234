//! Error Types
//!
//! This module defines the error types used throughout the exporter.
//!
//! # Overview
//!
//! The main error type [`ExportError`] covers the failure modes of
//! producing output: JSON serialization and file I/O. Traversal events
//! themselves never fail outward — a bad element or material is
//! substituted or skipped and logged, never allowed to abort the
//! session.
//!
//! # Usage
//!
//! Fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ExportError>`.

use thiserror::Error;

/// The main error type for the exporter.
#[derive(Error, Debug)]
pub enum ExportError {
    // ========================================================================
    // Output Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Alias for `Result<T, ExportError>`.
pub type Result<T> = std::result::Result<T, ExportError>;
