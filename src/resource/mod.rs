//! Resource bookkeeping
//!
//! Tracks which Traffic Director resources a manager owns, independent of
//! any remote API.
//!
//! # Architecture
//!
//! - [`kind`] - The fixed set of resource kinds and their base names
//! - [`naming`] - Deterministic `<prefix>-<base>-<suffix>` names
//! - [`registry`] - Present/absent record per kind
//!
//! # Example
//!
//! ```
//! use tdmesh::resource::{ResourceKind, ResourceNamer, ResourceRegistry};
//!
//! let namer = ResourceNamer::new("xds", "run1");
//! let registry = ResourceRegistry::new();
//! assert_eq!(namer.resource_name(ResourceKind::UrlMap), "xds-url-map-run1");
//! assert!(!registry.is_present(ResourceKind::UrlMap));
//! ```

mod kind;
mod naming;
mod registry;

pub use kind::{BackendRole, ResourceKind};
pub use naming::ResourceNamer;
pub use registry::{ManagedResource, ResourceRegistry};
