//! Capability verbs.
//!
//! The four core verbs are enum variants; the long tail of domain verbs
//! (`cancel`, `validate`, `read-privileged`, ...) travels as [`Verb::Custom`].

use axum::http::Method;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::GatekeeperError;

#[derive(Debug, Clone)]
pub enum Verb {
    Read,
    Create,
    Update,
    Archive,
    Custom(Cow<'static, str>),
}

impl Verb {
    pub const READ_PRIVILEGED: Verb = Verb::Custom(Cow::Borrowed("read-privileged"));
    pub const CANCEL: Verb = Verb::Custom(Cow::Borrowed("cancel"));
    pub const VALIDATE: Verb = Verb::Custom(Cow::Borrowed("validate"));
    pub const SIGN_UP: Verb = Verb::Custom(Cow::Borrowed("sign-up"));
    pub const SAVE_SCRIPTS: Verb = Verb::Custom(Cow::Borrowed("save-scripts"));
    pub const DIFF_SCRIPTS: Verb = Verb::Custom(Cow::Borrowed("diff-scripts"));
    pub const ACCEPT: Verb = Verb::Custom(Cow::Borrowed("accept"));
    pub const REFUSE: Verb = Verb::Custom(Cow::Borrowed("refuse"));

    /// Build a verb from its wire name. Names are lowercased and core names
    /// always map to their variant, so `Verb::new("Read") == Verb::Read`.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        let mut name = name.into();
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            name = Cow::Owned(name.to_ascii_lowercase());
        }
        match name.as_ref() {
            "read" => Verb::Read,
            "create" => Verb::Create,
            "update" => Verb::Update,
            "archive" => Verb::Archive,
            _ => Verb::Custom(name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Verb::Read => "read",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Archive => "archive",
            Verb::Custom(name) => name,
        }
    }

    pub fn is_core(&self) -> bool {
        !matches!(self, Verb::Custom(_))
    }

    /// The HTTP method a hypermedia link uses for this verb.
    pub fn http_method(&self) -> Method {
        match self {
            Verb::Read => Method::GET,
            Verb::Create => Method::POST,
            Verb::Update => Method::PUT,
            Verb::Archive => Method::DELETE,
            Verb::Custom(_) => Method::POST,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = GatekeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err(GatekeeperError::invalid_input("verb must not be empty"));
        }
        Ok(Verb::new(name.to_string()))
    }
}

impl From<&'static str> for Verb {
    fn from(name: &'static str) -> Self {
        Verb::new(name)
    }
}

// Equality, hashing and ordering all go through the wire name, so a
// `Custom("read")` built by hand still equals `Verb::Read`.
impl PartialEq for Verb {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Verb {}

impl Hash for Verb {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

// Alphabetical, so capability lists come out sorted.
impl Ord for Verb {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl PartialOrd for Verb {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Verb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Verb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_names_normalize() {
        assert_eq!(Verb::new("read"), Verb::Read);
        assert_eq!(Verb::new(String::from("archive")), Verb::Archive);
        assert_eq!(Verb::new("cancel"), Verb::CANCEL);
        assert!(!Verb::READ_PRIVILEGED.is_core());
        assert_eq!(Verb::Custom(Cow::Borrowed("read")), Verb::Read);
    }

    #[test]
    fn test_new_ignores_case() {
        assert_eq!(Verb::new("Read"), Verb::Read);
        assert!(Verb::new("ARCHIVE").is_core());
        assert_eq!(Verb::new("Read-Privileged"), Verb::READ_PRIVILEGED);
        assert_eq!(Verb::from("Cancel").as_str(), "cancel");
    }

    #[test]
    fn test_http_methods() {
        assert_eq!(Verb::Read.http_method(), Method::GET);
        assert_eq!(Verb::Create.http_method(), Method::POST);
        assert_eq!(Verb::Update.http_method(), Method::PUT);
        assert_eq!(Verb::Archive.http_method(), Method::DELETE);
        assert_eq!(Verb::VALIDATE.http_method(), Method::POST);
    }

    #[test]
    fn test_ordering_is_alphabetical() {
        let mut verbs = vec![Verb::Update, Verb::READ_PRIVILEGED, Verb::Archive, Verb::Read];
        verbs.sort();
        let names: Vec<_> = verbs.iter().map(Verb::as_str).collect();
        assert_eq!(names, ["archive", "read", "read-privileged", "update"]);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!("  ".parse::<Verb>().is_err());
        assert_eq!("Read".parse::<Verb>().unwrap(), Verb::Read);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&vec![Verb::Read, Verb::CANCEL]).unwrap();
        assert_eq!(json, r#"["read","cancel"]"#);
        let back: Vec<Verb> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Verb::Read, Verb::CANCEL]);
    }
}
