//! Authorization engine.
//!
//! This module answers "can actor A perform verb V on subject R?":
//! - **Classifier**: kind, resolved scope, visibility and owner of a subject
//! - **Resolver**: the actor's effective membership level, cached per request
//! - **Policy table**: immutable whitelist of (kind, level, visibility, owner) → verbs
//! - **Service**: `can`/`can_read`/... with per-request memoization
//! - **Capabilities**: verbs per queried kind, for hypermedia links
//! - **Errors**: denials rendered as 403 (or 500 for failed lookups)
//!
//! # Usage
//!
//! ```rust,ignore
//! use gatekeeper_core::authz::{Authorizer, CurrentActor, resources::Project};
//! use gatekeeper_core::store::PgMembershipStore;
//!
//! async fn show_project(
//!     State(app): State<AppState>,
//!     CurrentActor(actor): CurrentActor,
//!     Path(id): Path<ProjectId>,
//! ) -> Result<Json<ProjectView>, AuthzError> {
//!     let store = PgMembershipStore::begin(&app.pool).await.map_err(AuthzError::from_failure)?;
//!     let mut authz = app.authorizer.service(store, actor);
//!     let project = load_project(id).await?;
//!     authz.can_read(&project).await?;
//!     Ok(Json(ProjectView::new(project, authz.capabilities())))
//! }
//! ```

pub mod capabilities;
pub mod classifier;
pub mod error;
pub mod extract;
pub mod kind;
pub mod model;
pub mod policy;
pub mod resolver;
pub mod resources;
pub mod service;
pub mod subject;
pub mod verb;

pub use capabilities::{CapabilityMap, Link, Links};
pub use classifier::{Classification, Classifier, Scope};
pub use error::{AuthzError, Reason};
pub use extract::CurrentActor;
pub use kind::{Kind, ScopeShape};
pub use model::{Actor, ActorId, EnvironmentId, Level, OrganizationId, ProjectId, Visibility};
pub use policy::{GrantContext, PolicyRule, PolicyTable, PolicyTableBuilder};
pub use resolver::MembershipResolver;
pub use service::{Authorizer, AuthzService, Decision};
pub use subject::{ScopeRef, Subject, SubjectDescriptor};
pub use verb::Verb;
