//! The capability policy table.
//!
//! A table is a whitelist of rules. Each rule grants a set of verbs on one kind
//! to actors meeting its conditions:
//!
//! | Condition          | Meaning                                                 |
//! |--------------------|---------------------------------------------------------|
//! | `minimum_level`    | effective membership at or above this level             |
//! | `requires_owner_match` | the actor is the subject's owner                    |
//! | `requires_invitation` | the actor holds an open invitation to the scope      |
//! | `visibility`       | the subject has this visibility                         |
//!
//! A rule with no conditions applies to any authenticated actor. An absent actor
//! only ever matches public rules, and public rules may only grant `read`.
//!
//! The table is built once with [`PolicyTable::standard`] (or a
//! [`PolicyTableBuilder`]) and shared read-only behind an `Arc`.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::kind::Kind;
use super::model::{Level, Visibility};
use super::verb::Verb;
use crate::error::{GatekeeperError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyRule {
    pub kind: Kind,
    pub minimum_level: Option<Level>,
    pub requires_owner_match: bool,
    pub requires_invitation: bool,
    pub visibility: Option<Visibility>,
    pub verbs: BTreeSet<Verb>,
}

impl PolicyRule {
    fn new(kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            kind,
            minimum_level: None,
            requires_owner_match: false,
            requires_invitation: false,
            visibility: None,
            verbs: verbs.into_iter().collect(),
        }
    }

    /// Anyone, signed in or not, on a public subject.
    pub fn public(kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            visibility: Some(Visibility::Public),
            ..Self::new(kind, verbs)
        }
    }

    /// Any authenticated actor.
    pub fn authenticated(kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self::new(kind, verbs)
    }

    /// Actors whose effective level is at least `level`.
    pub fn at_level(kind: Kind, level: Level, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            minimum_level: Some(level),
            ..Self::new(kind, verbs)
        }
    }

    /// Only the subject's owner, whatever their membership.
    pub fn owner(kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            requires_owner_match: true,
            ..Self::new(kind, verbs)
        }
    }

    /// Actors invited into the subject's project or organization.
    pub fn invitee(kind: Kind, verbs: impl IntoIterator<Item = Verb>) -> Self {
        Self {
            requires_invitation: true,
            ..Self::new(kind, verbs)
        }
    }

    fn is_public(&self) -> bool {
        self.visibility == Some(Visibility::Public)
            && self.minimum_level.is_none()
            && !self.requires_owner_match
            && !self.requires_invitation
    }

    /// Whether this rule applies in `context`.
    pub fn matches(&self, context: &GrantContext) -> bool {
        if !context.authenticated {
            return self.is_public() && context.visibility.is_public();
        }
        if let Some(visibility) = self.visibility {
            if visibility != context.visibility {
                return false;
            }
        }
        if self.requires_owner_match && !context.owner_match {
            return false;
        }
        if self.requires_invitation && !context.invited {
            return false;
        }
        match self.minimum_level {
            Some(minimum) => context.level >= Some(minimum),
            None => true,
        }
    }

    /// Short human-readable description of who the rule grants to.
    pub fn grantee(&self) -> String {
        let mut parts = Vec::new();
        if let Some(visibility) = self.visibility {
            parts.push(match visibility {
                Visibility::Public => "public".to_string(),
                Visibility::Private => "private".to_string(),
            });
        }
        if let Some(level) = self.minimum_level {
            parts.push(format!("{}+", level));
        }
        if self.requires_owner_match {
            parts.push("owner".to_string());
        }
        if self.requires_invitation {
            parts.push("invitee".to_string());
        }
        if parts.is_empty() {
            "authenticated".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Everything about the actor/subject pair that a rule can condition on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrantContext {
    pub level: Option<Level>,
    pub visibility: Visibility,
    pub owner_match: bool,
    pub invited: bool,
    pub authenticated: bool,
}

impl GrantContext {
    pub fn anonymous(visibility: Visibility) -> Self {
        Self {
            level: None,
            visibility,
            owner_match: false,
            invited: false,
            authenticated: false,
        }
    }

    pub fn authenticated(level: Option<Level>, visibility: Visibility, owner_match: bool) -> Self {
        Self {
            level,
            visibility,
            owner_match,
            invited: false,
            authenticated: true,
        }
    }

    /// Mark an authenticated actor as holding an open invitation.
    pub fn with_invitation(mut self, invited: bool) -> Self {
        self.invited = invited && self.authenticated;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    rules: BTreeMap<Kind, Vec<PolicyRule>>,
}

impl PolicyTable {
    pub fn builder() -> PolicyTableBuilder {
        PolicyTableBuilder::default()
    }

    /// Verbs granted on `kind` in `context`. Kinds without rules grant nothing.
    pub fn grants(&self, kind: Kind, context: &GrantContext) -> BTreeSet<Verb> {
        self.rules
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|rule| rule.matches(context))
            .flat_map(|rule| rule.verbs.iter().cloned())
            .collect()
    }

    pub fn rules_for(&self, kind: Kind) -> &[PolicyRule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All rules, grouped by kind in kind order.
    pub fn rules(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.values().flatten()
    }

    /// Whether any rule on `kind` depends on an invitation, so callers only look
    /// invitations up when they can matter.
    pub fn grants_invitees(&self, kind: Kind) -> bool {
        self.rules_for(kind).iter().any(|rule| rule.requires_invitation)
    }

    /// Every verb any rule grants on `kind`.
    pub fn verbs_for(&self, kind: Kind) -> BTreeSet<Verb> {
        self.rules_for(kind)
            .iter()
            .flat_map(|rule| rule.verbs.iter().cloned())
            .collect()
    }

    /// Check the construction rules: no empty rules, public rules grant only `read`.
    pub fn validate(&self) -> Result<()> {
        for rule in self.rules() {
            if rule.verbs.is_empty() {
                return Err(GatekeeperError::invalid_policy(format!(
                    "rule for {} ({}) grants no verbs",
                    rule.kind,
                    rule.grantee()
                )));
            }
            if rule.visibility == Some(Visibility::Public) {
                if let Some(verb) = rule.verbs.iter().find(|v| **v != Verb::Read) {
                    return Err(GatekeeperError::invalid_policy(format!(
                        "public rule for {} grants {}",
                        rule.kind, verb
                    )));
                }
            }
        }
        Ok(())
    }

    /// The platform's policy.
    ///
    /// | Kind                 | Grants                                                         |
    /// |----------------------|----------------------------------------------------------------|
    /// | organization         | read if public, at guest or for invitees; create for anyone signed in; update/archive at owner |
    /// | project              | read if public, at member or for invitees; create/diff-scripts at member; update/save-scripts at manager; archive at owner |
    /// | job, task, environment, webhook, notification-rule, git-trigger, repository | read if the project is public or at guest; create/update/archive at manager |
    /// | script               | read at member; create/update/archive at manager               |
    /// | schedule             | read if the project is public or at guest; everything at member |
    /// | operation            | read if the project is public or at guest; cancel at member    |
    /// | secret               | read at member; read-privileged/create/archive at manager      |
    /// | invitation           | read/create/archive at manager; read/accept/refuse for the invitee |
    /// | session              | read/validate/archive for its owner                            |
    /// | user                 | read/update for the user themself                              |
    /// | project-member       | read if the project is public or at guest; create/update/archive at manager; read/archive for the member |
    /// | organization-member  | read at guest; create/update/archive at manager; read/archive for the member |
    pub fn standard() -> Self {
        use Level::{Guest, Manager, Member, Owner};
        use Verb::{Archive, Create, Read, Update};

        let mut builder = Self::builder()
            .rule(PolicyRule::public(Kind::Organization, [Read]))
            .rule(PolicyRule::at_level(Kind::Organization, Guest, [Read]))
            .rule(PolicyRule::invitee(Kind::Organization, [Read]))
            .rule(PolicyRule::authenticated(Kind::Organization, [Create]))
            .rule(PolicyRule::at_level(Kind::Organization, Owner, [Update, Archive]))
            .rule(PolicyRule::public(Kind::Project, [Read]))
            .rule(PolicyRule::invitee(Kind::Project, [Read]))
            .rule(PolicyRule::at_level(
                Kind::Project,
                Member,
                [Read, Create, Verb::DIFF_SCRIPTS],
            ))
            .rule(PolicyRule::at_level(
                Kind::Project,
                Manager,
                [Update, Verb::SAVE_SCRIPTS],
            ))
            .rule(PolicyRule::at_level(Kind::Project, Owner, [Archive]));

        // Everything a visitor of a public project, or a guest, may look at.
        for kind in Kind::ALL.into_iter().filter(Kind::visible_through_project) {
            builder = builder
                .rule(PolicyRule::public(kind, [Read]))
                .rule(PolicyRule::at_level(kind, Guest, [Read]));
        }

        for kind in [
            Kind::Job,
            Kind::Task,
            Kind::Environment,
            Kind::Webhook,
            Kind::NotificationRule,
            Kind::GitTrigger,
            Kind::Repository,
            Kind::ProjectMember,
            Kind::OrganizationMember,
        ] {
            builder = builder.rule(PolicyRule::at_level(kind, Manager, [Create, Update, Archive]));
        }

        for kind in [Kind::ProjectMember, Kind::OrganizationMember] {
            builder = builder.rule(PolicyRule::owner(kind, [Read, Archive]));
        }

        builder
            .rule(PolicyRule::at_level(Kind::OrganizationMember, Guest, [Read]))
            .rule(PolicyRule::at_level(Kind::Script, Member, [Read]))
            .rule(PolicyRule::at_level(
                Kind::Script,
                Manager,
                [Create, Update, Archive],
            ))
            .rule(PolicyRule::at_level(
                Kind::Schedule,
                Member,
                [Create, Update, Archive],
            ))
            .rule(PolicyRule::at_level(Kind::Operation, Member, [Verb::CANCEL]))
            .rule(PolicyRule::at_level(Kind::Secret, Member, [Read]))
            .rule(PolicyRule::at_level(
                Kind::Secret,
                Manager,
                [Verb::READ_PRIVILEGED, Create, Archive],
            ))
            .rule(PolicyRule::at_level(
                Kind::Invitation,
                Manager,
                [Read, Create, Archive],
            ))
            .rule(PolicyRule::owner(
                Kind::Invitation,
                [Read, Verb::ACCEPT, Verb::REFUSE],
            ))
            .rule(PolicyRule::owner(
                Kind::Session,
                [Read, Verb::VALIDATE, Archive],
            ))
            .rule(PolicyRule::owner(Kind::User, [Read, Update]))
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct PolicyTableBuilder {
    rules: BTreeMap<Kind, Vec<PolicyRule>>,
}

impl PolicyTableBuilder {
    pub fn rule(mut self, rule: PolicyRule) -> Self {
        self.rules.entry(rule.kind).or_default().push(rule);
        self
    }

    /// Build and validate.
    pub fn build(self) -> Result<PolicyTable> {
        let table = self.finish();
        table.validate()?;
        Ok(table)
    }

    fn finish(self) -> PolicyTable {
        PolicyTable { rules: self.rules }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn member_of(level: Option<Level>) -> GrantContext {
        GrantContext::authenticated(level, Visibility::Private, false)
    }

    fn set(verbs: &[Verb]) -> BTreeSet<Verb> {
        verbs.iter().cloned().collect()
    }

    #[test]
    fn test_standard_table_is_valid() {
        PolicyTable::standard().validate().unwrap();
    }

    #[test]
    fn test_every_kind_has_rules() {
        let table = PolicyTable::standard();
        for kind in Kind::ALL {
            assert!(!table.rules_for(kind).is_empty(), "no rules for {}", kind);
        }
    }

    #[test]
    fn test_secret_levels() {
        let table = PolicyTable::standard();
        assert_eq!(
            table.grants(Kind::Secret, &member_of(Some(Level::Member))),
            set(&[Verb::Read])
        );
        assert_eq!(
            table.grants(Kind::Secret, &member_of(Some(Level::Manager))),
            set(&[Verb::Read, Verb::READ_PRIVILEGED, Verb::Create, Verb::Archive])
        );
        assert!(table.grants(Kind::Secret, &member_of(None)).is_empty());
    }

    #[test]
    fn test_read_privileged_never_implied_by_read() {
        let table = PolicyTable::standard();
        for kind in Kind::ALL {
            for level in [None, Some(Level::Member)] {
                let grants = table.grants(kind, &member_of(level));
                assert!(!grants.contains(&Verb::READ_PRIVILEGED), "{} at {:?}", kind, level);
            }
        }
    }

    #[test]
    fn test_grants_monotonic_in_level() {
        let table = PolicyTable::standard();
        let levels = [
            None,
            Some(Level::Guest),
            Some(Level::Member),
            Some(Level::Manager),
            Some(Level::Owner),
        ];
        for kind in Kind::ALL {
            for visibility in [Visibility::Public, Visibility::Private] {
                for owner_match in [false, true] {
                    for invited in [false, true] {
                        for pair in levels.windows(2) {
                            let lower = table.grants(
                                kind,
                                &GrantContext::authenticated(pair[0], visibility, owner_match)
                                    .with_invitation(invited),
                            );
                            let higher = table.grants(
                                kind,
                                &GrantContext::authenticated(pair[1], visibility, owner_match)
                                    .with_invitation(invited),
                            );
                            assert!(lower.is_subset(&higher), "{} {:?}", kind, pair);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_anonymous_only_reads_public() {
        let table = PolicyTable::standard();
        for kind in Kind::ALL {
            let private = table.grants(kind, &GrantContext::anonymous(Visibility::Private));
            assert!(private.is_empty(), "{}", kind);

            let public = table.grants(kind, &GrantContext::anonymous(Visibility::Public));
            assert!(public.is_subset(&set(&[Verb::Read])), "{}", kind);
        }
        assert_eq!(
            table.grants(Kind::Project, &GrantContext::anonymous(Visibility::Public)),
            set(&[Verb::Read])
        );
    }

    #[test]
    fn test_visitor_reads_project_contents() {
        let table = PolicyTable::standard();
        let visitor = GrantContext::anonymous(Visibility::Public);
        for kind in Kind::ALL.into_iter().filter(Kind::visible_through_project) {
            assert_eq!(table.grants(kind, &visitor), set(&[Verb::Read]), "{}", kind);
        }
        assert!(table.grants(Kind::Secret, &visitor).is_empty());
        assert!(table.grants(Kind::Script, &visitor).is_empty());
    }

    #[test]
    fn test_guest_reads_without_writing() {
        let table = PolicyTable::standard();
        let guest = member_of(Some(Level::Guest));
        for kind in [Kind::Organization, Kind::OrganizationMember, Kind::ProjectMember, Kind::Job] {
            assert!(table.grants(kind, &guest).contains(&Verb::Read), "{}", kind);
        }
        assert_eq!(
            table.grants(Kind::Operation, &guest),
            set(&[Verb::Read])
        );
        assert!(table.grants(Kind::Secret, &guest).is_empty());
        assert!(table.grants(Kind::Script, &guest).is_empty());
        assert!(!table.grants(Kind::Project, &guest).contains(&Verb::Read));
    }

    #[test]
    fn test_invited_actor_reads_project_and_organization() {
        let table = PolicyTable::standard();
        let invited = member_of(None).with_invitation(true);
        assert_eq!(table.grants(Kind::Project, &invited), set(&[Verb::Read]));
        assert_eq!(
            table.grants(Kind::Organization, &invited),
            set(&[Verb::Read, Verb::Create])
        );
        assert!(table.grants(Kind::Job, &invited).is_empty());

        assert!(table.grants_invitees(Kind::Project));
        assert!(!table.grants_invitees(Kind::Job));
    }

    #[test]
    fn test_invitation_ignored_for_anonymous() {
        let context = GrantContext::anonymous(Visibility::Private).with_invitation(true);
        assert!(!context.invited);
        assert!(PolicyTable::standard().grants(Kind::Project, &context).is_empty());
    }

    #[test]
    fn test_session_requires_owner_match() {
        let table = PolicyTable::standard();
        let stranger = GrantContext::authenticated(Some(Level::Owner), Visibility::Private, false);
        assert!(table.grants(Kind::Session, &stranger).is_empty());

        let owner = GrantContext::authenticated(None, Visibility::Private, true);
        assert_eq!(
            table.grants(Kind::Session, &owner),
            set(&[Verb::Read, Verb::VALIDATE, Verb::Archive])
        );
    }

    #[test]
    fn test_invitee_without_membership() {
        let table = PolicyTable::standard();
        let invitee = GrantContext::authenticated(None, Visibility::Private, true);
        assert_eq!(
            table.grants(Kind::Invitation, &invitee),
            set(&[Verb::Read, Verb::ACCEPT, Verb::REFUSE])
        );
    }

    #[test]
    fn test_organization_create_for_anyone_signed_in() {
        let table = PolicyTable::standard();
        let grants = table.grants(Kind::Organization, &member_of(None));
        assert_eq!(grants, set(&[Verb::Create]));
    }

    #[test]
    fn test_public_rule_beyond_read_rejected() {
        let err = PolicyTable::builder()
            .rule(PolicyRule::public(Kind::Project, [Verb::Read, Verb::Update]))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPolicy);
    }

    #[test]
    fn test_empty_rule_rejected() {
        let err = PolicyTable::builder()
            .rule(PolicyRule::owner(Kind::Session, Vec::<Verb>::new()))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPolicy);
    }

    #[test]
    fn test_grantee_descriptions() {
        assert_eq!(PolicyRule::public(Kind::Project, [Verb::Read]).grantee(), "public");
        assert_eq!(
            PolicyRule::at_level(Kind::Job, Level::Manager, [Verb::Update]).grantee(),
            "manager+"
        );
        assert_eq!(PolicyRule::owner(Kind::Session, [Verb::Read]).grantee(), "owner");
        assert_eq!(PolicyRule::invitee(Kind::Project, [Verb::Read]).grantee(), "invitee");
        assert_eq!(
            PolicyRule::at_level(Kind::Job, Level::Guest, [Verb::Read]).grantee(),
            "guest+"
        );
        assert_eq!(
            PolicyRule::authenticated(Kind::Organization, [Verb::Create]).grantee(),
            "authenticated"
        );
    }
}
