//! Maps a resource type identifier to the `(group, version, kind, plural-path)` tuple needed
//! to build a request URL.
//!
//! Statically-typed `k8s_openapi` kinds carry this information at compile time via
//! [`Resource`]; this module only needs a registry for kinds that are known solely by name at
//! runtime (CRDs, [`DynamicObject`](crate::dynamic::DynamicObject)). A default, process-global
//! [`Scheme`] is not required for those kinds either -- callers may build their own registry, or
//! fall back to [`guess_path`] when no registration exists.

use crate::gvk::GroupVersionKind;
use crate::resource::to_plural;
use std::collections::HashMap;

/// A registered mapping from a [`GroupVersionKind`] to the URL path segment (the plural
/// "resource" name) used to address it.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    entries: HashMap<GroupVersionKind, String>,
}

impl Scheme {
    /// An empty scheme with no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind's true plural path, overriding the pluralization heuristic for it.
    pub fn register(&mut self, gvk: GroupVersionKind, plural: impl Into<String>) -> &mut Self {
        self.entries.insert(gvk, plural.into());
        self
    }

    /// Look up the plural path segment for a registered kind.
    ///
    /// Returns `None` when the kind was never registered; callers falling back to
    /// `k8s_openapi`'s compiled-in `Resource::plural` or to [`guess_path`] should do so in that
    /// case.
    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&str> {
        self.entries.get(gvk).map(String::as_str)
    }
}

/// Heuristically derive a plural URL path segment from a bare kind name.
///
/// This is the same pluralization rule `k8s_openapi`-backed [`Resource::plural`][crate::Resource::plural]
/// uses by default; it is exposed directly for callers constructing a request from only a group,
/// version, and kind string (e.g. from parsed YAML) with no registered [`Scheme`] entry.
pub fn guess_path(kind: &str) -> String {
    to_plural(&kind.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_kind_has_no_lookup() {
        let scheme = Scheme::new();
        let gvk = GroupVersionKind::gvk("apps", "v1", "Deployment");
        assert_eq!(scheme.lookup(&gvk), None);
    }

    #[test]
    fn registered_kind_overrides_heuristic() {
        let mut scheme = Scheme::new();
        let gvk = GroupVersionKind::gvk("example.com", "v1", "Foo");
        scheme.register(gvk.clone(), "foozes");
        assert_eq!(scheme.lookup(&gvk), Some("foozes"));
        assert_eq!(guess_path(&gvk.kind), "foos");
    }

    #[test]
    fn guess_path_matches_pluralization_rule() {
        assert_eq!(guess_path("Endpoints"), "endpoints");
        assert_eq!(guess_path("Pod"), "pods");
        assert_eq!(guess_path("Ingress"), "ingresses");
    }
}
