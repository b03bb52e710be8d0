//! Resource Registry - which managed resources currently exist
//!
//! A kind is present when it has an entry; absence means no entry, so an
//! absent resource can never carry a stale identity.

use super::kind::ResourceKind;
use super::naming::ResourceNamer;
use crate::error::{Result, TdError};
use crate::gcp::types::{BackendServiceProtocol, GcpResource};
use std::collections::HashMap;

/// A remote object this manager created or loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResource {
    pub kind: ResourceKind,
    pub resource: GcpResource,
    /// Backend services: their protocol. Target proxies: the backend
    /// protocol that selected the proxy flavor.
    pub protocol: Option<BackendServiceProtocol>,
}

impl ManagedResource {
    pub fn new(kind: ResourceKind, resource: GcpResource) -> Self {
        Self {
            kind,
            resource,
            protocol: None,
        }
    }

    pub fn with_protocol(mut self, protocol: BackendServiceProtocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    pub fn url(&self) -> &str {
        &self.resource.url
    }
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceKind, ManagedResource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&ManagedResource> {
        self.entries.get(&kind)
    }

    pub fn is_present(&self, kind: ResourceKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Fail with `AlreadyExists` when `kind` is tracked
    pub fn ensure_absent(&self, kind: ResourceKind) -> Result<()> {
        match self.entries.get(&kind) {
            Some(existing) => Err(TdError::AlreadyExists {
                kind,
                name: existing.name().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Look up `required`, failing with `MissingDependency` on behalf of `kind`
    pub fn require(&self, required: ResourceKind, kind: ResourceKind) -> Result<&ManagedResource> {
        self.entries
            .get(&required)
            .ok_or(TdError::MissingDependency { kind, required })
    }

    pub fn insert(&mut self, entry: ManagedResource) {
        self.entries.insert(entry.kind, entry);
    }

    pub fn remove(&mut self, kind: ResourceKind) -> Option<ManagedResource> {
        self.entries.remove(&kind)
    }

    /// Name to delete, or `None` when there is nothing to do
    ///
    /// Forced deletes use the derived name whether or not the kind is
    /// tracked; otherwise only tracked resources are deleted.
    pub fn deletion_target(
        &self,
        kind: ResourceKind,
        force: bool,
        namer: &ResourceNamer,
    ) -> Option<String> {
        if force {
            Some(namer.resource_name(kind).to_string())
        } else {
            self.entries.get(&kind).map(|e| e.name().to_string())
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
