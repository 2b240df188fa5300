//! The decision engine.
//!
//! An [`AuthzService`] is built per request from a shared [`Authorizer`], bound
//! to one store (one transaction) and one actor. It is not shared between
//! requests, so its caches are plain maps behind `&mut self`.
//!
//! ```rust,ignore
//! let mut authz = authorizer.service(PgMembershipStore::begin(&pool).await?, actor);
//! authz.can_read(&project).await?;
//! for job in &jobs {
//!     if authz.decide(Verb::Read, job).await.is_allowed() { /* ... */ }
//! }
//! let capabilities = authz.capabilities_by_subject();
//! ```

use metrics::counter;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use super::capabilities::CapabilityMap;
use super::classifier::{Classification, Classifier, Scope};
use super::error::AuthzError;
use super::kind::Kind;
use super::model::{Actor, Visibility};
use super::policy::{GrantContext, PolicyTable};
use super::resolver::MembershipResolver;
use super::subject::Subject;
use super::verb::Verb;
use crate::config::AuthzConfig;
use crate::error::Result;
use crate::store::MembershipStore;

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// The answer to one `verb` on one subject.
#[derive(Debug, Clone)]
pub struct Decision {
    allowed: bool,
    verb: Verb,
    have: Vec<Verb>,
    cause: Option<AuthzError>,
}

impl Decision {
    fn allow(verb: Verb, have: Vec<Verb>) -> Self {
        Self {
            allowed: true,
            verb,
            have,
            cause: None,
        }
    }

    fn deny(verb: Verb, have: Vec<Verb>, cause: AuthzError) -> Self {
        Self {
            allowed: false,
            verb,
            have,
            cause: Some(cause),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    pub fn verb(&self) -> &Verb {
        &self.verb
    }

    /// The verb that was missing, for capability denials.
    pub fn missing_verb(&self) -> Option<&Verb> {
        self.cause.as_ref().and_then(AuthzError::missing_capability)
    }

    /// Verbs the actor holds on the subject.
    pub fn have_verbs(&self) -> &[Verb] {
        &self.have
    }

    pub fn cause(&self) -> Option<&AuthzError> {
        self.cause.as_ref()
    }

    pub fn into_result(self) -> std::result::Result<(), AuthzError> {
        match (self.allowed, self.cause) {
            (true, _) => Ok(()),
            (false, Some(cause)) => Err(cause),
            (false, None) => Err(AuthzError::capability_missing(self.verb, self.have)),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authorizer
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-wide half of the engine: the policy and its configuration.
#[derive(Debug, Clone)]
pub struct Authorizer {
    policy: Arc<PolicyTable>,
    config: AuthzConfig,
}

impl Authorizer {
    /// Validate `policy` and wrap it for sharing.
    pub fn new(policy: PolicyTable, config: AuthzConfig) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            policy: Arc::new(policy),
            config,
        })
    }

    pub fn standard(config: AuthzConfig) -> Result<Self> {
        Self::new(PolicyTable::standard(), config)
    }

    pub fn policy(&self) -> &Arc<PolicyTable> {
        &self.policy
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// A fresh engine for one request.
    pub fn service<S: MembershipStore>(&self, store: S, actor: Option<Actor>) -> AuthzService<S> {
        AuthzService::new(store, actor, Arc::clone(&self.policy), self.config.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecisionKey {
    kind: Kind,
    scope: Scope,
    visibility: Visibility,
    owner_match: bool,
    verb: Verb,
}

pub struct AuthzService<S> {
    store: S,
    actor: Option<Actor>,
    policy: Arc<PolicyTable>,
    config: AuthzConfig,
    classifier: Classifier,
    resolver: MembershipResolver,
    decisions: HashMap<DecisionKey, Decision>,
    capabilities: CapabilityMap,
    extra_grants: BTreeMap<Kind, BTreeSet<Verb>>,
    blocked: Option<bool>,
}

impl<S: MembershipStore> AuthzService<S> {
    pub fn new(
        store: S,
        actor: Option<Actor>,
        policy: Arc<PolicyTable>,
        config: AuthzConfig,
    ) -> Self {
        Self {
            store,
            actor,
            policy,
            config,
            classifier: Classifier::new(),
            resolver: MembershipResolver::new(),
            decisions: HashMap::new(),
            capabilities: CapabilityMap::new(),
            extra_grants: BTreeMap::new(),
            blocked: None,
        }
    }

    /// Grant an authenticated actor `verbs` on every subject of `kind`,
    /// on top of the policy (e.g. for platform administrators).
    pub fn with_grants(mut self, kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        self.grant(kind, verbs);
        self
    }

    pub fn grant(&mut self, kind: Kind, verbs: impl IntoIterator<Item = Verb>) {
        self.extra_grants.entry(kind).or_default().extend(verbs);
        self.decisions.clear();
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give the store back, e.g. to commit its transaction.
    pub fn into_store(self) -> S {
        self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decisions
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide whether the actor may perform `verb` on `subject`.
    ///
    /// Never fails: lookup errors become denials carrying an internal cause.
    pub async fn decide<T>(&mut self, verb: Verb, subject: &T) -> Decision
    where
        T: Subject + ?Sized,
    {
        match self.evaluate(&verb, subject).await {
            Ok(decision) => decision,
            Err(error) => {
                let cause = AuthzError::from_failure(error);
                cause.log();
                counter!(
                    "gatekeeper_decisions_total",
                    "kind" => kind_label(subject.authorization_name()),
                    "verb" => verb.to_string(),
                    "outcome" => "error",
                )
                .increment(1);
                Decision::deny(verb, Vec::new(), cause)
            }
        }
    }

    pub async fn can<T>(&mut self, verb: Verb, subject: &T) -> std::result::Result<(), AuthzError>
    where
        T: Subject + ?Sized,
    {
        self.decide(verb, subject).await.into_result()
    }

    pub async fn can_read<T>(&mut self, subject: &T) -> std::result::Result<(), AuthzError>
    where
        T: Subject + ?Sized,
    {
        self.can(Verb::Read, subject).await
    }

    pub async fn can_create<T>(&mut self, subject: &T) -> std::result::Result<(), AuthzError>
    where
        T: Subject + ?Sized,
    {
        self.can(Verb::Create, subject).await
    }

    pub async fn can_update<T>(&mut self, subject: &T) -> std::result::Result<(), AuthzError>
    where
        T: Subject + ?Sized,
    {
        self.can(Verb::Update, subject).await
    }

    pub async fn can_archive<T>(&mut self, subject: &T) -> std::result::Result<(), AuthzError>
    where
        T: Subject + ?Sized,
    {
        self.can(Verb::Archive, subject).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enumeration
    // ─────────────────────────────────────────────────────────────────────────

    /// Verbs granted per kind, for every kind queried so far in this session.
    pub fn capabilities_by_subject(&self) -> BTreeMap<String, Vec<String>> {
        self.capabilities.to_wire()
    }

    pub fn capabilities(&self) -> &CapabilityMap {
        &self.capabilities
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn evaluate<T>(&mut self, verb: &Verb, subject: &T) -> Result<Decision>
    where
        T: Subject + ?Sized,
    {
        if self.actor_is_blocked().await? {
            return Ok(Decision::deny(verb.clone(), Vec::new(), AuthzError::blocked()));
        }

        let mut classification = self.classifier.classify(&self.store, subject).await?;
        if self.actor.is_none() {
            classification = self
                .classifier
                .through_project(&self.store, classification)
                .await?;
        }
        let owner_match = match (&self.actor, &classification.owner) {
            (Some(actor), Some(owner)) => actor.id == *owner,
            _ => false,
        };

        let key = DecisionKey {
            kind: classification.kind,
            scope: classification.scope,
            visibility: classification.visibility,
            owner_match,
            verb: verb.clone(),
        };
        if let Some(decision) = self.decisions.get(&key) {
            counter!(
                "gatekeeper_decision_cache_hits_total",
                "kind" => classification.kind.as_str(),
            )
            .increment(1);
            return Ok(decision.clone());
        }

        let grants = self.grants_for(&classification, owner_match).await?;
        self.capabilities
            .record(classification.kind, grants.iter().cloned());

        let have: Vec<Verb> = grants.iter().cloned().collect();
        let decision = if grants.contains(verb) {
            Decision::allow(verb.clone(), have)
        } else {
            Decision::deny(
                verb.clone(),
                have.clone(),
                AuthzError::capability_missing(verb.clone(), have),
            )
        };

        self.record(&classification, &decision);
        self.decisions.insert(key, decision.clone());
        Ok(decision)
    }

    async fn grants_for(
        &mut self,
        classification: &Classification,
        owner_match: bool,
    ) -> Result<BTreeSet<Verb>> {
        let context = match &self.actor {
            None => GrantContext::anonymous(classification.visibility),
            Some(actor) => {
                let level = self
                    .resolver
                    .level_for(&self.store, Some(actor), &classification.scope)
                    .await?;
                let invited = if self.policy.grants_invitees(classification.kind) {
                    self.resolver
                        .invited_to(&self.store, Some(actor), &classification.scope)
                        .await?
                } else {
                    false
                };
                GrantContext::authenticated(level, classification.visibility, owner_match)
                    .with_invitation(invited)
            }
        };

        let mut grants = self.policy.grants(classification.kind, &context);
        if context.authenticated {
            if let Some(extra) = self.extra_grants.get(&classification.kind) {
                grants.extend(extra.iter().cloned());
            }
        }
        Ok(grants)
    }

    async fn actor_is_blocked(&mut self) -> Result<bool> {
        if !self.config.check_user_blocks {
            return Ok(false);
        }
        let Some(actor) = &self.actor else {
            return Ok(false);
        };
        if let Some(blocked) = self.blocked {
            return Ok(blocked);
        }
        let blocked = self.store.actor_is_blocked(&actor.id).await?;
        self.blocked = Some(blocked);
        Ok(blocked)
    }

    fn record(&self, classification: &Classification, decision: &Decision) {
        let outcome = if decision.is_allowed() { "allowed" } else { "denied" };
        counter!(
            "gatekeeper_decisions_total",
            "kind" => classification.kind.as_str(),
            "verb" => decision.verb().to_string(),
            "outcome" => outcome,
        )
        .increment(1);

        let actor = self.actor.as_ref().map(|a| a.id.to_string());
        if self.config.log_decisions {
            info!(
                actor = ?actor,
                kind = %classification.kind,
                scope = ?classification.scope,
                verb = %decision.verb(),
                outcome,
                "Authorization decision"
            );
        } else {
            debug!(
                actor = ?actor,
                kind = %classification.kind,
                scope = ?classification.scope,
                verb = %decision.verb(),
                outcome,
                "Authorization decision"
            );
        }
    }
}

/// Metric label for a subject name; unregistered names share one label.
fn kind_label(name: &str) -> &'static str {
    Kind::from_name(name).map_or("unknown", |kind| kind.as_str())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
