#![allow(clippy::result_large_err)]
//! # Gatekeeper Core
//!
//! Authorization engine for a multi-tenant CI/operations backend.
//!
//! ## Architecture
//!
//! - **Authz**: subject classification, membership resolution, the policy table
//!   and the per-request decision service
//! - **Store**: membership and scope lookups, backed by PostgreSQL or memory
//! - **Error**: error codes, HTTP mapping and the JSON error envelope
//! - **Config**: file and environment configuration
//! - **Logging**: tracing subscriber setup

pub mod authz;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use error::{ErrorCode, ErrorResponse, ErrorSeverity, GatekeeperError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::authz::{
        Actor, ActorId, Authorizer, AuthzError, AuthzService, CurrentActor, Decision,
        EnvironmentId, Kind, Level, OrganizationId, PolicyTable, ProjectId, Reason, ScopeRef,
        Subject, SubjectDescriptor, Verb, Visibility,
    };
    pub use crate::config::{AuthzConfig, Config, DatabaseConfig};
    pub use crate::error::{ErrorCode, GatekeeperError, Result};
    pub use crate::store::{InMemoryMembershipStore, MembershipStore, PgMembershipStore};
}
