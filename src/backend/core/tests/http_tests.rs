//! HTTP tests for denials rendered by axum handlers.
//!
//! Tests cover:
//! - 403 envelope with missing and held capabilities
//! - Generic 500 envelope when membership lookups fail
//! - Anonymous and authenticated actors via `CurrentActor`
//! - Capabilities returned alongside a successful read

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    routing::{get, post},
    Json, Router,
};
use gatekeeper_core::authz::resources::Project;
use gatekeeper_core::authz::{
    Actor, ActorId, Authorizer, AuthzError, CurrentActor, Level, OrganizationId, ProjectId,
};
use gatekeeper_core::config::AuthzConfig;
use gatekeeper_core::store::InMemoryMembershipStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Test Application
// ============================================================================

#[derive(Clone)]
struct App {
    authorizer: Authorizer,
    store: Arc<InMemoryMembershipStore>,
    projects: Arc<HashMap<ProjectId, Project>>,
}

async fn show_project(
    State(app): State<App>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ProjectId>,
) -> Result<Json<Value>, AuthzError> {
    let project = app
        .projects
        .get(&id)
        .cloned()
        .ok_or_else(|| AuthzError::custom("not_found"))?;

    let mut authz = app.authorizer.service(app.store.clone(), actor);
    authz.can_read(&project).await?;
    Ok(Json(json!({
        "id": project.id,
        "capabilities": authz.capabilities_by_subject(),
    })))
}

async fn archive_project(
    State(app): State<App>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<ProjectId>,
) -> Result<StatusCode, AuthzError> {
    let project = app
        .projects
        .get(&id)
        .cloned()
        .ok_or_else(|| AuthzError::custom("not_found"))?;

    let mut authz = app.authorizer.service(app.store.clone(), actor);
    authz.can_archive(&project).await?;
    Ok(StatusCode::NO_CONTENT)
}

struct Fixture {
    router: Router,
    store: Arc<InMemoryMembershipStore>,
    public: Project,
    private: Project,
}

fn fixture() -> Fixture {
    let organization = OrganizationId::random();
    let public = Project {
        public: true,
        ..Project::new_in(organization)
    };
    let private = Project::new_in(organization);

    let store = Arc::new(
        InMemoryMembershipStore::new()
            .with_project(public.id, organization)
            .with_project(private.id, organization),
    );
    let projects = [public.clone(), private.clone()]
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let app = App {
        authorizer: Authorizer::standard(AuthzConfig::default()).unwrap(),
        store: store.clone(),
        projects: Arc::new(projects),
    };
    let router = Router::new()
        .route("/projects/:id", get(show_project))
        .route("/projects/:id/archive", post(archive_project))
        .with_state(app);

    Fixture {
        router,
        store,
        public,
        private,
    }
}

async fn send(router: Router, method: &str, uri: String, actor: Option<Actor>) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    if let Some(actor) = actor {
        request.extensions_mut().insert(actor);
    }

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// Envelope Tests
// ============================================================================

#[tokio::test]
async fn test_anonymous_reads_public_project() {
    let fixture = fixture();
    let (status, body) = send(
        fixture.router,
        "GET",
        format!("/projects/{}", fixture.public.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capabilities"]["project"], json!(["read"]));
}

#[tokio::test]
async fn test_anonymous_private_project_is_forbidden() {
    let fixture = fixture();
    let (status, body) = send(
        fixture.router,
        "GET",
        format!("/projects/{}", fixture.private.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "capability_missing");
    assert_eq!(body["errors"]["missing_capability"], json!(["read"]));
    assert_eq!(body["errors"]["have_capabilities"], json!([]));
}

#[tokio::test]
async fn test_member_cannot_archive() {
    let fixture = fixture();
    let member = Actor::new(ActorId::random());
    fixture
        .store
        .add_project_membership(member.id, fixture.private.id, Level::Manager);

    let (status, body) = send(
        fixture.router,
        "POST",
        format!("/projects/{}/archive", fixture.private.id),
        Some(member),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errors"]["missing_capability"], json!(["archive"]));
    assert_eq!(
        body["errors"]["have_capabilities"],
        json!(["create", "diff-scripts", "read", "save-scripts", "update"])
    );
}

#[tokio::test]
async fn test_owner_archives() {
    let fixture = fixture();
    let owner = Actor::new(ActorId::random());
    fixture
        .store
        .add_project_membership(owner.id, fixture.private.id, Level::Owner);

    let (status, _) = send(
        fixture.router,
        "POST",
        format!("/projects/{}/archive", fixture.private.id),
        Some(owner),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_blocked_actor_is_forbidden() {
    let fixture = fixture();
    let blocked = Actor::new(ActorId::random());
    fixture
        .store
        .add_project_membership(blocked.id, fixture.public.id, Level::Owner);
    fixture.store.add_block(blocked.id, chrono::Utc::now() - chrono::Duration::hours(1), None);

    let (status, body) = send(
        fixture.router,
        "GET",
        format!("/projects/{}", fixture.public.id),
        Some(blocked),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "blocked");
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_lookup_failure_is_internal_and_generic() {
    let fixture = fixture();
    fixture.store.set_failing(true);

    let (status, body) = send(
        fixture.router,
        "GET",
        format!("/projects/{}", fixture.private.id),
        Some(Actor::new(ActorId::random())),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"reason": "internal", "message": "An internal error occurred"}));
}
