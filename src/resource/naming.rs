//! Resource naming
//!
//! Names are `<prefix>-<base>-<suffix>`, or `<prefix>-<base>` when the
//! suffix is empty. Every kind's name is computed once at construction, so
//! a forced delete can always recompute the name a previous process used.

use super::kind::ResourceKind;
use std::collections::HashMap;

const SEPARATOR: &str = "-";

#[derive(Debug, Clone)]
pub struct ResourceNamer {
    prefix: String,
    suffix: String,
    names: HashMap<ResourceKind, String>,
}

impl ResourceNamer {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        let names = ResourceKind::ALL
            .iter()
            .map(|kind| (*kind, join_name(prefix, kind.base_name(), suffix)))
            .collect();

        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            names,
        }
    }

    /// Name of the resource of this kind owned by the manager
    pub fn resource_name(&self, kind: ResourceKind) -> &str {
        // Every kind is populated in `new`.
        self.names
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Name for an auxiliary object that is not a managed kind
    pub fn make_name(&self, base: &str) -> String {
        join_name(&self.prefix, base, &self.suffix)
    }
}

fn join_name(prefix: &str, base: &str, suffix: &str) -> String {
    let mut parts = vec![prefix, base];
    if !suffix.is_empty() {
        parts.push(suffix);
    }
    parts.join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::BackendRole;

    #[test]
    fn test_name_with_suffix() {
        let namer = ResourceNamer::new("xds-k8s", "20240101-abcd");
        assert_eq!(
            namer.resource_name(ResourceKind::HealthCheck),
            "xds-k8s-health-check-20240101-abcd"
        );
        assert_eq!(
            namer.resource_name(ResourceKind::BackendService(BackendRole::Affinity)),
            "xds-k8s-backend-service-affinity-20240101-abcd"
        );
    }

    #[test]
    fn test_empty_suffix_has_no_trailing_separator() {
        let namer = ResourceNamer::new("td", "");
        assert_eq!(namer.resource_name(ResourceKind::UrlMap), "td-url-map");
        assert_eq!(namer.make_name("path-matcher"), "td-path-matcher");
    }

    #[test]
    fn test_every_kind_has_a_name() {
        let namer = ResourceNamer::new("p", "s");
        for kind in ResourceKind::ALL {
            assert!(namer.resource_name(kind).starts_with("p-"));
            assert!(namer.resource_name(kind).ends_with("-s"));
        }
    }
}
