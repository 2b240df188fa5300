//! Subcommands of the `gatekeeper` binary.

pub mod check;
pub mod grants;
pub mod policy;

use gatekeeper_core::authz::Verb;

pub(crate) fn join_verbs<'a>(verbs: impl IntoIterator<Item = &'a Verb>) -> String {
    let names: Vec<&str> = verbs.into_iter().map(Verb::as_str).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}
