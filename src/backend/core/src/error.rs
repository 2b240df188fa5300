//! Error handling for Gatekeeper Core.
//!
//! This module provides:
//! - A single crate error type with machine-readable codes
//! - HTTP status mapping for API responses
//! - User-facing messages kept apart from internal detail
//! - Error logging with tracing and an error counter
//!
//! Authorization denials have their own type, [`crate::authz::AuthzError`], which
//! wraps a [`GatekeeperError`] when a denial was caused by a failed lookup.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Gatekeeper operations.
pub type Result<T> = std::result::Result<T, GatekeeperError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
///
/// The serialized form doubles as the `reason` field of the JSON error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Authorization
    CapabilityMissing,
    Blocked,
    NoAuthorizationDefined,

    // Input
    InvalidInput,

    // Store
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    RecordNotFound,

    // Configuration
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,
    InvalidPolicy,

    // System
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::CapabilityMissing | Self::Blocked | Self::NoAuthorizationDefined => {
                StatusCode::FORBIDDEN
            }
            Self::InvalidInput => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RecordNotFound => StatusCode::NOT_FOUND,
            Self::DatabaseConnectionFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InvalidPolicy
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category.
    pub const fn category(&self) -> &'static str {
        match self {
            Self::CapabilityMissing | Self::Blocked | Self::NoAuthorizationDefined => "authz",
            Self::InvalidInput => "input",
            Self::DatabaseError
            | Self::DatabaseConnectionFailed
            | Self::DatabaseQueryFailed
            | Self::RecordNotFound => "store",
            Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InvalidPolicy => "config",
            Self::InternalError => "system",
        }
    }

    /// The wire name, as used in the `reason` field.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CapabilityMissing => "capability_missing",
            Self::Blocked => "blocked",
            Self::NoAuthorizationDefined => "no_authorization_defined",
            Self::InvalidInput => "invalid_input",
            Self::DatabaseError => "database_error",
            Self::DatabaseConnectionFailed => "database_connection_failed",
            Self::DatabaseQueryFailed => "database_query_failed",
            Self::RecordNotFound => "record_not_found",
            Self::ConfigurationError => "configuration_error",
            Self::MissingConfiguration => "missing_configuration",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::InvalidPolicy => "invalid_policy",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Error severity levels for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Expected outcomes such as denials
    Low,
    /// Caller mistakes
    Medium,
    /// Store and configuration failures
    High,
    /// Broken invariants inside the engine
    Critical,
}

impl ErrorSeverity {
    /// Determine severity from error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::CapabilityMissing | ErrorCode::Blocked | ErrorCode::RecordNotFound => {
                Self::Low
            }
            ErrorCode::InvalidInput => Self::Medium,
            ErrorCode::DatabaseError
            | ErrorCode::DatabaseConnectionFailed
            | ErrorCode::DatabaseQueryFailed
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,
            ErrorCode::NoAuthorizationDefined | ErrorCode::InvalidPolicy | ErrorCode::InternalError => {
                Self::Critical
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Gatekeeper Core.
#[derive(Error, Debug)]
pub struct GatekeeperError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for GatekeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl GatekeeperError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create an invalid input error (422).
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create a store failure that carries no driver error, e.g. from a test double.
    pub fn database(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::DatabaseError, "A database error occurred", message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InvalidConfiguration,
            "Configuration is invalid",
            message,
        )
    }

    /// Create an error for a policy table that breaks its own construction rules.
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InvalidPolicy, "Authorization policy is invalid", message)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add internal message.
    pub fn with_internal_message(mut self, message: impl Into<String>) -> Self {
        self.internal_message = Some(message.into());
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.as_str();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "request failed"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "request rejected"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "request denied"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "gatekeeper_errors_total",
            "code" => self.code.as_str(),
            "category" => self.code.category(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// JSON error envelope shared by every error rendered over HTTP.
///
/// ```json
/// {"reason":"capability_missing","message":"...","errors":{"missing_capability":["read"]}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable reason
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Field-keyed lists of error values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ErrorResponse {
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    /// Attach a list of values under `field`.
    pub fn with_errors(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.errors.insert(field.into(), values);
        self
    }
}

impl From<&GatekeeperError> for ErrorResponse {
    fn from(error: &GatekeeperError) -> Self {
        Self::new(error.code.as_str(), error.user_message.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for GatekeeperError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

impl From<sqlx::Error> for GatekeeperError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (
                ErrorCode::RecordNotFound,
                "The requested record was not found",
            ),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            sqlx::Error::Database(_) => (ErrorCode::DatabaseQueryFailed, "A database error occurred"),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<config::ConfigError> for GatekeeperError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (ErrorCode::ConfigurationError, "Configuration error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
