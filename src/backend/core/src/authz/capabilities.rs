//! Capability enumeration and hypermedia link decoration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::kind::Kind;
use super::verb::Verb;

/// A hypermedia link: `{"href": "...", "read": "GET", "archive": "DELETE"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(flatten)]
    pub methods: BTreeMap<String, String>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            methods: BTreeMap::new(),
        }
    }
}

/// Links keyed by relation name.
pub type Links = BTreeMap<String, Link>;

/// Verbs granted per kind over the subjects queried so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap(BTreeMap<Kind, BTreeSet<Verb>>);

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `verbs` into the entry for `kind`, creating it even when empty.
    pub fn record(&mut self, kind: Kind, verbs: impl IntoIterator<Item = Verb>) {
        self.0.entry(kind).or_default().extend(verbs);
    }

    pub fn get(&self, kind: Kind) -> Option<&BTreeSet<Verb>> {
        self.0.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Kind, &BTreeSet<Verb>)> {
        self.0.iter()
    }

    /// Kind name to sorted verb names.
    pub fn to_wire(&self) -> BTreeMap<String, Vec<String>> {
        self.0
            .iter()
            .map(|(kind, verbs)| {
                (
                    kind.as_str().to_string(),
                    verbs.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    /// Annotate links with the HTTP method of every granted verb.
    ///
    /// A relation named after a kind, or its plural, receives that kind's verbs.
    /// `self` receives the verbs of `self_kind`.
    pub fn decorate_links(&self, links: &mut Links, self_kind: Option<Kind>) {
        for (rel, link) in links.iter_mut() {
            let kind = if rel == "self" {
                self_kind
            } else {
                self.0
                    .keys()
                    .copied()
                    .find(|kind| rel == kind.as_str() || *rel == kind.plural())
            };

            let Some(verbs) = kind.and_then(|kind| self.0.get(&kind)) else {
                continue;
            };
            for verb in verbs {
                link.methods
                    .insert(verb.to_string(), verb.http_method().to_string());
            }
        }
    }
}
