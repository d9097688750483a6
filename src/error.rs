//! Error types for the protection engine
//!
//! This module provides the error taxonomy with:
//! - Detailed variants for configuration, catalog and farbling failures
//! - Classification (fatal construction bugs vs locally recovered conditions)
//! - Error codes for programmatic handling on the JavaScript side
//!
//! Most of these errors never reach a wrapped API call: level and variant
//! lookups recover to the default level or to "group disabled" at the call
//! site, and store failures keep the last loaded snapshot authoritative.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, ShieldError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Resolution errors (1xx)
    UnknownLevel = 100,
    InvalidVariant = 101,
    UnknownGroup = 102,
    MalformedDomainEntry = 103,

    // Persistence errors (2xx)
    StoreUnavailable = 200,
    SerializationFailed = 201,

    // Catalog construction errors (3xx) - FATAL
    DuplicateGroup = 300,
    DuplicateSurface = 301,

    // Farbling errors (4xx)
    InvalidGeometry = 400,
    EntropyError = 401,

    // Internal errors (9xx)
    InternalError = 900,
}

/// Main error type for the protection engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShieldError {
    // ===== Resolution Errors =====
    #[error("Unknown level: {0}")]
    UnknownLevel(String),

    #[error("Invalid variant {index} for group {group}")]
    InvalidVariant { group: String, index: u32 },

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Malformed domain entry for {domain}: {reason}")]
    MalformedDomainEntry { domain: String, reason: String },

    // ===== Persistence Errors =====
    #[error("Configuration store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ===== Catalog Errors (FATAL) =====
    #[error("Group registered twice: {0}")]
    DuplicateGroup(String),

    #[error("Surface {surface} already governed by group {group}")]
    DuplicateSurface { surface: String, group: String },

    // ===== Farbling Errors =====
    #[error("Buffer length {actual} does not match geometry (expected {expected})")]
    InvalidGeometry { expected: usize, actual: usize },

    #[error("Image of {width}x{height} pixels is too large")]
    GeometryOverflow { width: usize, height: usize },

    #[error("Entropy/RNG failure: {0}")]
    Entropy(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShieldError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            ShieldError::UnknownLevel(_) => ErrorCode::UnknownLevel,
            ShieldError::InvalidVariant { .. } => ErrorCode::InvalidVariant,
            ShieldError::UnknownGroup(_) => ErrorCode::UnknownGroup,
            ShieldError::MalformedDomainEntry { .. } => ErrorCode::MalformedDomainEntry,

            ShieldError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            ShieldError::Serialization(_) => ErrorCode::SerializationFailed,

            ShieldError::DuplicateGroup(_) => ErrorCode::DuplicateGroup,
            ShieldError::DuplicateSurface { .. } => ErrorCode::DuplicateSurface,

            ShieldError::InvalidGeometry { .. } | ShieldError::GeometryOverflow { .. } => {
                ErrorCode::InvalidGeometry
            }
            ShieldError::Entropy(_) => ErrorCode::EntropyError,

            ShieldError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error is fatal (a configuration bug in the built-in catalog)
    ///
    /// Fatal errors can only surface while the catalog is being constructed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShieldError::DuplicateGroup(_) | ShieldError::DuplicateSurface { .. }
        )
    }

    /// Whether this error is recovered locally and must never reach the page
    ///
    /// Unknown levels fall back to the default level, invalid variants to a
    /// disabled group, malformed tweaks are pruned and store failures keep the
    /// previous snapshot.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShieldError::UnknownLevel(_)
                | ShieldError::InvalidVariant { .. }
                | ShieldError::UnknownGroup(_)
                | ShieldError::MalformedDomainEntry { .. }
                | ShieldError::StoreUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for ShieldError {
    fn from(err: serde_json::Error) -> Self {
        ShieldError::Serialization(err.to_string())
    }
}

/// Errors cross the JS boundary as `{ code, message, is_fatal, is_recoverable }`.
impl From<ShieldError> for JsValue {
    fn from(err: ShieldError) -> Self {
        serde_wasm_bindgen::to_value(&ErrorInfo::from(&err))
            .unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub is_fatal: bool,
    pub is_recoverable: bool,
}

impl From<&ShieldError> for ErrorInfo {
    fn from(err: &ShieldError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            is_fatal: err.is_fatal(),
            is_recoverable: err.is_recoverable(),
        }
    }
}
