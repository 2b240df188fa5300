//! Authorization denials.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::verb::Verb;
use crate::error::{ErrorCode, ErrorResponse, GatekeeperError};

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The actor lacks the verb; recoverable by the client.
    CapabilityMissing,
    /// The actor has an active block.
    Blocked,
    /// The subject's kind has no authorization defined.
    NoAuthorizationDefined,
    /// A lookup failed; details stay internal.
    Internal,
    /// A short code supplied by a caller.
    Custom(String),
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Reason::CapabilityMissing => "capability_missing",
            Reason::Blocked => "blocked",
            Reason::NoAuthorizationDefined => "no_authorization_defined",
            Reason::Internal => "internal",
            Reason::Custom(code) => code,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A denial, with enough detail to tell the client what was missing.
///
/// The wrapped internal error, if any, is only ever logged.
#[derive(Debug, Clone)]
pub struct AuthzError {
    reason: Reason,
    missing_capability: Option<Verb>,
    have_capabilities: Vec<Verb>,
    internal: Option<Arc<GatekeeperError>>,
}

impl AuthzError {
    /// The actor lacks `missing`; `have` lists what they do hold on the subject.
    pub fn capability_missing(missing: Verb, have: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            reason: Reason::CapabilityMissing,
            missing_capability: Some(missing),
            have_capabilities: have.into_iter().collect(),
            internal: None,
        }
    }

    pub fn blocked() -> Self {
        Self::with_reason(Reason::Blocked)
    }

    /// Deny with a caller-supplied short code.
    pub fn custom(code: impl Into<String>) -> Self {
        Self::with_reason(Reason::Custom(code.into()))
    }

    /// Wrap an error raised while classifying or resolving.
    pub fn from_failure(error: GatekeeperError) -> Self {
        let reason = match error.code() {
            ErrorCode::NoAuthorizationDefined => Reason::NoAuthorizationDefined,
            _ => Reason::Internal,
        };
        Self {
            internal: Some(Arc::new(error)),
            ..Self::with_reason(reason)
        }
    }

    fn with_reason(reason: Reason) -> Self {
        Self {
            reason,
            missing_capability: None,
            have_capabilities: Vec::new(),
            internal: None,
        }
    }

    pub fn reason(&self) -> &Reason {
        &self.reason
    }

    pub fn missing_capability(&self) -> Option<&Verb> {
        self.missing_capability.as_ref()
    }

    pub fn have_capabilities(&self) -> &[Verb] {
        &self.have_capabilities
    }

    pub fn internal(&self) -> Option<&GatekeeperError> {
        self.internal.as_deref()
    }

    pub fn is_internal(&self) -> bool {
        self.reason == Reason::Internal
    }

    pub fn http_status(&self) -> StatusCode {
        match self.reason {
            Reason::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }

    /// The JSON body this denial renders as.
    pub fn to_response_body(&self) -> ErrorResponse {
        match &self.reason {
            Reason::CapabilityMissing => {
                let mut body = ErrorResponse::new(self.reason.as_str(), self.to_string())
                    .with_errors(
                        "missing_capability",
                        self.missing_capability
                            .iter()
                            .map(|v| v.to_string())
                            .collect(),
                    );
                body.errors.insert(
                    "have_capabilities".to_string(),
                    self.have_capabilities.iter().map(|v| v.to_string()).collect(),
                );
                body
            }
            Reason::Internal => ErrorResponse::new("internal", "An internal error occurred"),
            reason => ErrorResponse::new(reason.as_str(), self.to_string()),
        }
    }

    /// Log with a level that matches how surprising the denial is.
    pub fn log(&self) {
        match &self.reason {
            Reason::CapabilityMissing => debug!(
                reason = %self.reason,
                missing = ?self.missing_capability.as_ref().map(Verb::as_str),
                "Authorization denied"
            ),
            Reason::Blocked => info!(reason = %self.reason, "Blocked actor denied"),
            Reason::NoAuthorizationDefined | Reason::Internal => error!(
                reason = %self.reason,
                internal = ?self.internal.as_ref().map(|e| e.to_string()),
                "Authorization failed"
            ),
            Reason::Custom(_) => debug!(reason = %self.reason, "Authorization denied"),
        }
    }
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, &self.missing_capability) {
            (Reason::CapabilityMissing, Some(verb)) => {
                write!(f, "authz: capability missing: {}", verb)
            }
            (Reason::Blocked, _) => f.write_str("authz: user is blocked"),
            (Reason::NoAuthorizationDefined, _) => {
                f.write_str("authz: no authorization defined for this resource")
            }
            (reason, _) => write!(f, "authz: {}", reason),
        }
    }
}

impl std::error::Error for AuthzError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.internal
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        self.log();
        (self.http_status(), Json(self.to_response_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_missing_envelope() {
        let err = AuthzError::capability_missing(Verb::Update, [Verb::Archive, Verb::Read]);
        let body = serde_json::to_value(err.to_response_body()).unwrap();
        assert_eq!(body["reason"], "capability_missing");
        assert_eq!(body["errors"]["missing_capability"], serde_json::json!(["update"]));
        assert_eq!(
            body["errors"]["have_capabilities"],
            serde_json::json!(["archive", "read"])
        );
        assert_eq!(err.http_status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_error_is_not_exposed() {
        let err = AuthzError::from_failure(GatekeeperError::database(
            "relation \"project_memberships\" does not exist",
        ));
        assert!(err.is_internal());
        assert_eq!(err.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.internal().is_some());

        let body = serde_json::to_string(&err.to_response_body()).unwrap();
        assert!(!body.contains("project_memberships"));
        assert!(body.contains("\"reason\":\"internal\""));
    }

    #[test]
    fn test_unclassifiable_renders_as_forbidden() {
        let err = AuthzError::from_failure(GatekeeperError::new(
            ErrorCode::NoAuthorizationDefined,
            "No authorization is defined for this resource",
        ));
        assert_eq!(err.reason(), &Reason::NoAuthorizationDefined);
        assert_eq!(err.http_status(), StatusCode::FORBIDDEN);
        let body = err.to_response_body();
        assert_eq!(body.reason, "no_authorization_defined");
        assert!(body.errors.is_empty());
    }

    #[test]
    fn test_custom_reason() {
        let err = AuthzError::custom("limits_exceeded");
        assert_eq!(err.reason().as_str(), "limits_exceeded");
        assert_eq!(err.to_response_body().reason, "limits_exceeded");
        assert!(err.missing_capability().is_none());
    }

    #[test]
    fn test_display() {
        let err = AuthzError::capability_missing(Verb::READ_PRIVILEGED, Vec::new());
        assert_eq!(err.to_string(), "authz: capability missing: read-privileged");
        assert_eq!(AuthzError::blocked().to_string(), "authz: user is blocked");
    }
}
